use ai::Tool;

/// `tables` is the newline-separated table list captured at startup.
pub fn system_prompt(tables: &str, tools: &[Tool]) -> String {
    let tables = tables
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let tools = tools
        .iter()
        .map(|tool| tool.function.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are an AI agent that can access a postgres database.\n\
         The available tables in the database are: {tables}\n\
         You also have access to the following tools: {tools}."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai::{HashMap, create_tool};

    #[test]
    fn lists_tables_and_tool_names() {
        let tools = vec![
            create_tool("list_tables", "List tables", HashMap::new()),
            create_tool("run_sql_query", "Run a query", HashMap::new()),
        ];
        let prompt = system_prompt("journeys\nusers\n", &tools);

        assert!(prompt.starts_with("You are an AI agent that can access a postgres database."));
        assert!(prompt.contains("The available tables in the database are: journeys, users\n"));
        assert!(prompt.contains("the following tools: list_tables, run_sql_query."));
    }

    #[test]
    fn prompt_ends_with_the_tool_list() {
        let tools = vec![create_tool("write_report", "Write a report", HashMap::new())];
        let prompt = system_prompt("users", &tools);

        assert_eq!(
            prompt,
            "You are an AI agent that can access a postgres database.\n\
             The available tables in the database are: users\n\
             You also have access to the following tools: write_report."
        );
    }

    #[test]
    fn empty_database_still_produces_a_prompt() {
        let prompt = system_prompt("", &[]);
        assert!(prompt.contains("The available tables in the database are: \n"));
    }
}
