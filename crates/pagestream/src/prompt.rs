//! Prompt text for a requested page.
//!
//! The relay treats the prompt as an opaque string. Deployments that want
//! their own wording (site persona, ad slots, house style) implement
//! [`PromptSource`]; [`PathPrompt`] is the built-in default.

/// Produces the user prompt for one page request.
pub trait PromptSource: Send + Sync {
    fn prompt(&self, path: &str, user_agent: &str) -> String;
}

impl<F> PromptSource for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn prompt(&self, path: &str, user_agent: &str) -> String {
        self(path, user_agent)
    }
}

/// Asks for a complete, self-contained HTML document describing `path`.
#[derive(Debug, Clone, Default)]
pub struct PathPrompt;

impl PromptSource for PathPrompt {
    fn prompt(&self, path: &str, user_agent: &str) -> String {
        let path = if path.is_empty() { "/" } else { path };
        let mut prompt = format!(
            "Write a complete HTML document for the web page at the path \"{path}\". \
Infer the topic from the path. Respond with raw HTML only, starting with <!DOCTYPE html>, \
with inline CSS and no external resources. Links to related pages must be relative paths \
on this site."
        );
        if !user_agent.is_empty() {
            prompt.push_str(&format!(
                " The visitor's browser identifies as \"{user_agent}\"; keep the layout readable on it."
            ));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_prompt_mentions_path_and_agent() {
        let prompt = PathPrompt.prompt("/rust/ownership", "Mozilla/5.0");
        assert!(prompt.contains("\"/rust/ownership\""));
        assert!(prompt.contains("Mozilla/5.0"));
    }

    #[test]
    fn empty_path_means_root() {
        let prompt = PathPrompt.prompt("", "");
        assert!(prompt.contains("\"/\""));
        assert!(!prompt.contains("browser identifies"));
    }

    #[test]
    fn closures_are_prompt_sources() {
        let source = |path: &str, _ua: &str| format!("page {path}");
        assert_eq!(source.prompt("/x", "ua"), "page /x");
    }
}
