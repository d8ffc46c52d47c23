pub mod fal;
pub mod openai;

pub use fal::{fetch_credits, generate_image, random_seed};
pub use openai::request_prompt_assistance;
