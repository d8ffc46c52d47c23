use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub log_level: String,
    pub fal_key: String,
    pub fal_base_url: String,
    pub fal_dashboard_base_url: String,
    pub flux_model: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub data_dir: PathBuf,
    /// None disables the cap.
    pub history_cap: Option<usize>,
    pub max_body_bytes: usize,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Reads configuration from the environment. Every value has a default;
    /// missing API keys are reported later as upstream auth failures rather
    /// than refusing to start.
    pub fn load() -> Self {
        let history_cap = env_usize("HISTORY_CAP", 20);

        Config {
            bind_addr: env_string("BIND_ADDR", "127.0.0.1:3000"),
            log_level: env_string("LOG_LEVEL", "info").to_lowercase(),
            fal_key: env_string("FAL_KEY", ""),
            fal_base_url: env_string("FAL_BASE_URL", "https://fal.run"),
            fal_dashboard_base_url: env_string(
                "FAL_DASHBOARD_BASE_URL",
                "https://dashboard.fal.ai",
            ),
            flux_model: env_string("FLUX_MODEL", "fal-ai/flux/dev"),
            openai_api_key: env_string("OPENAI_API_KEY", ""),
            openai_base_url: env_string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_model: env_string("OPENAI_MODEL", "gpt-4"),
            data_dir: PathBuf::from(env_string("DATA_DIR", "data")),
            history_cap: (history_cap > 0).then_some(history_cap),
            max_body_bytes: env_usize("MAX_BODY_BYTES", 262_144),
        }
    }
}

pub const PROMPT_ASSIST_SYSTEM_PROMPT: &str = r#"You are FLUX Prompt Pro, an expert at creating prompts for the FLUX.1 AI image generation model.
Your goal is to help users create detailed, effective prompts.

Guidelines:
1. Create precise, detailed prompts that describe the desired image
2. Include style, mood, lighting, and technical aspects
3. Format your response clearly with "Final prompt:" followed by the prompt
4. Keep responses focused and professional
5. Suggest improvements to user's ideas when appropriate

Example format:
"I understand you want [brief description]. Here's an enhanced prompt:

Final prompt: [detailed prompt with style, mood, and technical aspects]""#;
