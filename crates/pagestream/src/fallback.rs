//! Self-contained HTML error document.
//!
//! Used only when a request fails before any byte has been forwarded. Once
//! streaming has started the response is already committed, so a failure
//! there just ends the body.

/// Render the error page for `message` with `status_code`.
pub fn render(message: &str, status_code: u16) -> String {
    let message = escape_html(message);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Error {status_code}</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 40rem; margin: 4rem auto; padding: 0 1rem; color: #222; }}
h1 {{ font-size: 1.5rem; }}
.status {{ color: #888; }}
</style>
</head>
<body>
<h1>Something went wrong</h1>
<p class="status">Error {status_code}</p>
<p class="message">{message}</p>
<p><a href="/">Back to the home page</a></p>
</body>
</html>
"#
    )
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_status_message_and_home_link() {
        let html = render("HTTP 500: Internal Server Error", 500);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Error 500</title>"));
        assert!(html.contains("HTTP 500: Internal Server Error"));
        assert!(html.contains(r#"<a href="/">"#));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn message_is_escaped() {
        let html = render("<script>alert('x')</script> & co", 502);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; co"));
    }

    #[test]
    fn escape_leaves_plain_text_alone() {
        assert_eq!(escape_html("plain text, 100%"), "plain text, 100%");
        assert_eq!(escape_html("\"q\""), "&quot;q&quot;");
    }
}
