use ai::{ChatMessage, MessageObserver, Role};
use colored::{Color, Colorize};
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;

/// Prints every outgoing message list as coloured boxes on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrinter;

impl MessageObserver for ConsolePrinter {
    fn on_chat_model_start(&self, messages: &[ChatMessage]) {
        println!("\n\n\n\n ==================== SENDING MESSAGES ==================== \n\n");

        for message in messages {
            let (title, color) = style(message.role);
            let table = framed(title, &message_body(message));
            println!("{}", table.to_string().color(color));
        }
    }
}

fn style(role: Role) -> (&'static str, Color) {
    match role {
        Role::System => ("system", Color::Blue),
        Role::User => ("human", Color::Magenta),
        Role::Assistant => ("ai", Color::Green),
        Role::Tool => ("function", Color::TrueColor { r: 160, g: 32, b: 240 }),
    }
}

fn framed(title: &str, body: &str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![title])
        .add_row(vec![body]);
    table
}

fn message_body(message: &ChatMessage) -> String {
    let mut lines: Vec<String> = message.text().lines().map(str::to_string).collect();
    for call in &message.tool_calls {
        lines.push(format!("-> {}({})", call.function.name, call.function.arguments));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_has_role_header_and_every_line() {
        let rendered = framed("ai", "hello\nwide world").to_string();

        assert!(rendered.starts_with('╭'), "{rendered}");
        assert!(rendered.ends_with('╯'), "{rendered}");
        assert!(rendered.contains(" ai "));
        assert!(rendered.contains("hello"));
        assert!(rendered.contains("wide world"));
    }

    #[test]
    fn tool_messages_are_purple() {
        let tool = ChatMessage::tool("call_1", "users");
        assert_eq!(
            style(tool.role),
            ("function", Color::TrueColor { r: 160, g: 32, b: 240 })
        );
    }

    #[test]
    fn tool_calls_are_shown() {
        let message: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "list_columns", "arguments": "{\"table_name\":\"users\"}"}
            }]
        }))
        .unwrap();

        assert_eq!(
            message_body(&message),
            r#"-> list_columns({"table_name":"users"})"#
        );
    }
}
