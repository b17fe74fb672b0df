use super::TranslationOptions;
use crate::error::Result;

/// Build the instruction payload for one batch.
///
/// The batch is embedded as a JSON array with non-ASCII characters left as
/// they are, so the model sees the text the way the user wrote it.
pub fn build_prompt(batch: &[String], options: &TranslationOptions) -> Result<String> {
    let input = serde_json::to_string(batch)?;

    let mut prompt = format!(
        "You are a professional translator.\n\
         Translate the following array of text strings into {}.\n\
         \n\
         Rules:\n\
         1. Maintain the exact order of the input array.\n\
         2. Preserve any special formatting codes, numbers, or symbols.\n\
         3. If a string is a proper noun or code that should not be translated, keep it as is.\n",
        options.target_language
    );

    if let Some(instruction) = &options.custom_instruction {
        prompt.push_str(&format!("4. Custom Instruction from user: {}\n", instruction));
    }

    prompt.push_str("5. Return ONLY the JSON array of strings.\n\nInput Array:\n");
    prompt.push_str(&input);
    Ok(prompt)
}
