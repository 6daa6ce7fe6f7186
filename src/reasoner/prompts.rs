use crate::resource::words;
use crate::template::fill;

const DIRECT_PROMPT: &str = "`[WITHIN {n_words} WORDS:]`\n{question}";

const CONSOLIDATION_PROMPT: &str = "\
Assuming that the following question/problem/task is posed

```
{question}
```

and you have received various answers/solutions from different informational resources as detailed below,
please consolidate within {n_words} words a final answer/solution that you believe is the most correct.


```
{resources_and_answers}
```
";

const ORIENT_PROMPT: &str = "\
Assuming that the following question/problem/task is posed

```
{question}
```

and you have observed various answers/solutions from different informational resources as detailed below,
please evaluate whether you can answer/solve the posed question/problem/task confidently with concrete results.
If the question/problem/task mentions any RIGOROUS BASES/CRITERIA/DEFINITIONS for judgement,
the concrete results MUST RESPOND TO SUCH BASES/CRITERIA/DEFINITIONS for the answer/solution to be considered confident.
If the question/problem/task involves any NUMERICAL QUANTITIES (e.g., MULTIPLES or RATIOS) to be retrieved or calculated,
the concrete results MUST CONTAIN SPECIFIC VALUES for such quantities for the answer/solution to be considered confident.

If you can answer/solve confidently, return a JSON dictionary
`{\"confident\": true, \"answer\": \"<your answer/solution using up to {n_words} words>\"}`.

If you cannot answer/solve confidently, return a JSON dictionary
`{\"confident\": false, \"answer\": \"<your best-effort answer/solution>\" OR null}`.

Please return ONLY the JSON DICTIONARY and no other text, not even the \"```json\" wrapping!

```
{observations}
```
";

pub(crate) fn direct(question: &str, n_words: usize) -> String {
    fill(
        DIRECT_PROMPT,
        &[("n_words", &words(n_words)), ("question", question)],
    )
}

pub(crate) fn consolidation(question: &str, n_words: usize, resources_and_answers: &str) -> String {
    fill(
        CONSOLIDATION_PROMPT,
        &[
            ("question", question),
            ("n_words", &words(n_words)),
            ("resources_and_answers", resources_and_answers),
        ],
    )
}

pub(crate) fn orient(question: &str, n_words: usize, observations: &str) -> String {
    fill(
        ORIENT_PROMPT,
        &[
            ("question", question),
            ("n_words", &words(n_words)),
            ("observations", observations),
        ],
    )
}
