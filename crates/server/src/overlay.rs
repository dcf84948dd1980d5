//! Overlay page, rendered with the current display settings

use landing_judge_config::Settings;

const TEMPLATE: &str = include_str!("../assets/overlay.html");

pub fn render(settings: &Settings) -> String {
    let effects = serde_json::to_string(&settings.effects()).unwrap_or_else(|_| "{}".to_string());
    TEMPLATE
        .replace("{{OVERLAY_HUE_DEG}}", &settings.overlay_hue_deg.to_string())
        .replace("{{BANNER_DURATION_MS}}", &settings.banner_duration_ms.to_string())
        .replace("{{BANNER_MIN_LINGER_MS}}", &settings.banner_min_linger_ms.to_string())
        .replace("{{HIDE_ON_AUDIO_END}}", &settings.hide_on_audio_end.to_string())
        .replace("{{ENABLE_DINGDONG}}", &settings.enable_dingdong.to_string())
        .replace("{{EFFECTS_JSON}}", &effects)
}
