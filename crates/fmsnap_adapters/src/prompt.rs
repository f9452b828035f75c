use dialoguer::Input;
use fmsnap_core::ports::PromptInput;
use fmsnap_core::Error;

/// Terminal prompt adapter: masked input for secrets, plain dialoguer
/// input for everything else. Only constructed by the CLI; use cases
/// see the `PromptInput` port.
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptInput for TerminalPrompt {
    fn prompt_secret(&self, prompt: &str) -> Result<Option<String>, Error> {
        let reply = rpassword::prompt_password(prompt)
            .map_err(|e| Error::Usage(format!("failed to read password: {}", e)))?;
        if reply.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reply))
        }
    }

    fn prompt_line(&self, prompt: &str) -> Result<String, Error> {
        Input::new()
            .with_prompt(prompt)
            .interact_text()
            .map_err(|e| Error::Usage(format!("failed to read input: {}", e)))
    }
}
