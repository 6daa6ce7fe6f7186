use std::collections::BTreeMap;

use crate::template::fill;

/// Header the simplified decomposition asks the LM to put before each sub-task.
pub(crate) const SUB_TASK_HEADER: &str = "[SUB-QUESTION/PROBLEM/TASK]";

const HTP_JSON_TEMPLATE: &str = r#"
{
    "task": "(textual description of question/problem/task to answer/solve)",
    "sub-plans": [
        {
            "task": "(textual description of 1st sub-question/problem/task to answer/solve)",
            "sub-plans": [
                (... nested sub-plans ...)
            ]
        },
        {
            "task": "(textual description of 2nd sub-question/problem/task to answer/solve)",
            "sub-plans": [
                (... nested sub-plans ...)
            ]
        },
        ...
    ]
}
"#;

const HTP_WITH_RESOURCES_JSON_TEMPLATE: &str = r#"
{
    "task": {
        "ask": "(textual description of question/problem/task to answer/solve)"
    },
    "sub-plans": [
        {
            "task": {
                "ask": "(textual description of 1st sub-question/problem/task to answer/solve)",
                "resource": "(unique name of most relevant informational resource, IF ANY)" OR null
            },
            "sub-plans": [
                (... nested sub-plans ...)
            ]
        },
        {
            "task": {
                "ask": "(textual description of 2nd sub-question/problem/task to answer/solve)",
                "resource": "(unique name of most relevant informational resource, IF ANY)" OR null
            },
            "sub-plans": [
                (... nested sub-plans ...)
            ]
        },
        ...
    ]
}
"#;

const HTP_REQUEST: &str = "
please return a suggested hierarchical task plan with
Max Depth of {max_depth} and Max Subtasks per Decomposition of {max_subtasks_per_decomp}
for the following question/problem/task:

```
{problem}
```

Please return ONLY the JSON DICTIONARY and no other text, not even the \"```json\" wrapping!
";

const RESOURCE_OVERVIEW_SECTION: &str = "\
Consider that you can access informational resources summarized in the below dictionary,
in which each key is a resource's unique name and the corresponding value is that resource's overview:

```
{resource_overviews}
```

";

const UPDATE_RESOURCES_REQUEST: &str = "\
and consider that you are trying to solve the following top-level question/problem/task:

```
{problem}
```

please return an updated version of the following JSON hierarchical task plan
by appropriately replacing `\"resource\": null` with `\"resource\": \"(unique name of most relevant informational resource)\"`
for any case in which such a relevant informational resource can be identified for the corresponding sub-question/problem/task:

```json
{htp_json}
```

Please return ONLY the UPDATED JSON DICTIONARY and no other text, not even the \"```json\" wrapping!
";

const SIMPLIFIED_DECOMPOSITION_REQUEST: &str = "\
Consider that you are trying to solve the following top-level question/problem/task:

```
{problem}
```

please return a sequence of up to {max_subtasks_per_decomp} sentences/paragraphs,
EACH PREPENDED by a header \"[SUB-QUESTION/PROBLEM/TASK]\" (EXACTLY LITERALLY THAT STRING! DO NOT SUBSTITUTE THAT STRING!),
describing how such top-level question/problem/task could/should be decomposed into sub-questions/problems/tasks,
per the following template:

```
[SUB-QUESTION/PROBLEM/TASK]
<textual description of 1st sub-question/problem/task to answer/solve>
[SUB-QUESTION/PROBLEM/TASK]
<textual description of 2nd sub-question/problem/task to answer/solve>
...
```

Please return ONLY the SEQUENCE OF SENTENCES/PARAGRAPHS WITH SUCH HEADERS, and no other text.
";

fn overview_section(overviews: &BTreeMap<String, String>) -> String {
    let rendered = serde_json::to_string_pretty(overviews).unwrap_or_default();
    fill(RESOURCE_OVERVIEW_SECTION, &[("resource_overviews", &rendered)])
}

/// Prompt for a whole plan. `overviews` selects the resource-aware template.
pub(crate) fn plan(
    problem: &str,
    overviews: Option<&BTreeMap<String, String>>,
    max_depth: usize,
    max_subtasks_per_decomp: usize,
) -> String {
    let (preamble, template) = match overviews {
        Some(overviews) => (overview_section(overviews), HTP_WITH_RESOURCES_JSON_TEMPLATE),
        None => (String::new(), HTP_JSON_TEMPLATE),
    };
    let request = fill(
        HTP_REQUEST,
        &[
            ("max_depth", &max_depth.to_string()),
            ("max_subtasks_per_decomp", &max_subtasks_per_decomp.to_string()),
            ("problem", problem),
        ],
    );
    format!("{preamble}Using the following JSON hierarchical task plan data structure:\n{template}{request}")
}

pub(crate) fn update_resources(
    problem: &str,
    overviews: &BTreeMap<String, String>,
    htp_json: &str,
) -> String {
    let request = fill(
        UPDATE_RESOURCES_REQUEST,
        &[("htp_json", htp_json), ("problem", problem)],
    );
    format!("{}{request}", overview_section(overviews))
}

pub(crate) fn simplified_decomposition(
    problem: &str,
    overviews: Option<&BTreeMap<String, String>>,
    max_subtasks_per_decomp: usize,
) -> String {
    let preamble = overviews.map(overview_section).unwrap_or_default();
    let request = fill(
        SIMPLIFIED_DECOMPOSITION_REQUEST,
        &[
            ("max_subtasks_per_decomp", &max_subtasks_per_decomp.to_string()),
            ("problem", problem),
        ],
    );
    if preamble.is_empty() {
        request
    } else {
        // The overview section ends mid-sentence; continue it with "and".
        format!("{preamble}and {}", lowercase_first(&request))
    }
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Split a simplified-decomposition reply into sub-task descriptions.
pub(crate) fn parse_sub_tasks(reply: &str, max: usize) -> Vec<String> {
    reply
        .split(SUB_TASK_HEADER)
        .skip(1)
        .map(|part| part.trim().trim_matches('`').trim().to_string())
        .filter(|part| !part.is_empty())
        .take(max.max(1))
        .collect()
}
