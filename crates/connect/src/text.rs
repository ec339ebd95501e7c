//! Plain-text helpers for user-visible strings.
//!
//! Product descriptions and server error messages arrive as HTML fragments;
//! invoices and order notes want plain text.

/// Strip HTML tags from a fragment, keeping the text content.
#[must_use]
pub fn strip_tags(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => output.push(ch),
            _ => {}
        }
    }
    output
}

/// Flatten an HTML fragment into readable plain text.
///
/// Line breaks, list items and paragraphs become newlines and dashes before
/// the remaining tags are stripped. Used for error messages stored on
/// orders, which the API may deliver as formatted HTML.
#[must_use]
pub fn html_to_text(input: &str) -> String {
    let mut text = input.to_string();
    for br in ["<br>", "<br/>", "<br />", "<br \\/>", "<br\\/>"] {
        text = text.replace(br, "\n");
    }
    text = text.replace("<ul>", "").replace("</ul>", "\n");
    text = text.replace("<li>", "- ").replace("</li>", "\n");
    text = text.replace("<p>", "").replace("</p>", "\n\n");
    strip_tags(&text).trim().to_string()
}
