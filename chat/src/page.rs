const STYLE: &str = r"
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 3rem auto; padding: 0 1rem; color: #1e1e1e; }
h1 { font-size: 1.4rem; }
textarea { width: 100%; min-height: 6rem; font: inherit; padding: .5rem; box-sizing: border-box; }
button { margin-top: .5rem; padding: .4rem 1.2rem; font: inherit; }
pre { white-space: pre-wrap; background: #f4f4f4; padding: 1rem; border-radius: 4px; }
";

/// The whole UI: one input, one output.
pub(crate) fn render(input: &str, output: Option<&str>) -> String {
    let output = output.map_or_else(String::new, |text| {
        format!(
            "<h2>Output</h2>\n<pre id=\"output\">{}</pre>\n",
            escape(text)
        )
    });

    format!(
        "<!doctype html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>tabletalk</title>\n\
         <style>{STYLE}</style>\n\
         </head>\n\
         <body>\n\
         <h1>Ask the database</h1>\n\
         <form method=\"post\" action=\"/\">\n\
         <textarea name=\"input\" placeholder=\"How many users signed up last week?\">{}</textarea>\n\
         <button type=\"submit\">Submit</button>\n\
         </form>\n\
         {output}\
         </body>\n\
         </html>\n",
        escape(input)
    )
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn empty_page_has_no_output_block() {
        let page = render("", None);
        assert!(page.contains("<form method=\"post\" action=\"/\">"));
        assert!(!page.contains("id=\"output\""));
    }

    #[test]
    fn output_and_input_are_escaped() {
        let page = render("<script>", Some("a < b"));
        assert!(page.contains(">&lt;script&gt;</textarea>"));
        assert!(page.contains("<pre id=\"output\">a &lt; b</pre>"));
    }
}
