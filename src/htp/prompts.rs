use crate::context::AskAnsPair;
use crate::template::fill;

pub(crate) const SYNTHESIS_PROMPT: &str = "\
Synthesize an answer/solution for the following question/problem/task:

```
{ask}
```

given the following collection of reasoning and results:

```
{info}
```

Please present important reasoning flows and supporting details, but
please DO NOT USE GENERIC NAMES/NUMBERS TO REFER TO SUPPORTING DETAILS
(e.g., \"Supporting Question/Task #3\", \"Supporting Result #4\", etc.)
because such generic referencing names could get very confusing when presented in larger conversations.
";

/// The `{info}` block: direct reasoning, then supporting results, then
/// results from outside this subtree.
pub(crate) fn synthesis_inputs(
    baseline: &str,
    sub_results: &[AskAnsPair],
    other_results: &[AskAnsPair],
) -> String {
    let mut info = format!(
        "REASONING WITHOUT SUPPORTING/OTHER RESULTS \
         (preliminary conclusions here can be overriden by more convincing supporting/other data):\n\
         {baseline}\n\n\n"
    );
    info.push_str(&numbered("SUPPORTING", sub_results));
    if !other_results.is_empty() {
        info.push_str("\n\n");
        info.push_str(&numbered("OTHER", other_results));
    }
    info
}

fn numbered(label: &str, pairs: &[AskAnsPair]) -> String {
    pairs
        .iter()
        .enumerate()
        .map(|(i, (ask, result))| {
            let n = i + 1;
            format!("{label} QUESTION/TASK #{n}:\n{ask}\n\n{label} RESULT #{n}:\n{result}\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(crate) fn synthesis_prompt(ask: &str, info: &str) -> String {
    fill(SYNTHESIS_PROMPT, &[("ask", ask), ("info", info)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_number_supporting_and_other_results() {
        let info = synthesis_inputs(
            "draft",
            &[("Q1".into(), "A1".into()), ("Q2".into(), "A2".into())],
            &[("O1".into(), "R1".into())],
        );
        assert!(info.starts_with("REASONING WITHOUT SUPPORTING/OTHER RESULTS"));
        assert!(info.contains("draft\n"));
        assert!(info.contains("SUPPORTING QUESTION/TASK #1:\nQ1\n\nSUPPORTING RESULT #1:\nA1\n"));
        assert!(info.contains("SUPPORTING QUESTION/TASK #2:\nQ2\n"));
        assert!(info.contains("OTHER QUESTION/TASK #1:\nO1\n\nOTHER RESULT #1:\nR1\n"));
    }

    #[test]
    fn synthesis_prompt_keeps_braces_in_the_ask() {
        let prompt = synthesis_prompt("Why is {info} empty?", "facts");
        assert!(prompt.contains("```\nWhy is {info} empty?\n```"));
        assert_eq!(prompt.matches("facts").count(), 1);
    }

    #[test]
    fn no_other_section_without_other_results() {
        let info = synthesis_inputs("draft", &[("Q1".into(), "A1".into())], &[]);
        assert!(!info.contains("OTHER QUESTION"));
    }
}
