/// One weighted evaluation criterion used by the critique stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Criterion {
    pub name: &'static str,
    pub description: &'static str,
    pub questions: &'static [&'static str],
    pub weight: f32,
}

/// Evaluation criteria; the weights sum to 1.0
pub static CRITERIA: [Criterion; 6] = [
    Criterion {
        name: "clarity",
        description: "Is the prompt clear and unambiguous?",
        questions: &[
            "Are the instructions clearly stated?",
            "Is there any ambiguity in what is being requested?",
            "Are key terms well-defined?",
            "Does the prompt use precise language?",
        ],
        weight: 0.25,
    },
    Criterion {
        name: "specificity",
        description: "Is the prompt specific enough to generate the desired response?",
        questions: &[
            "Does the prompt clearly specify the expected output format?",
            "Are there specific requirements or constraints mentioned?",
            "Does the prompt include enough detail for accurate generation?",
            "Is the scope of the request clearly defined?",
        ],
        weight: 0.20,
    },
    Criterion {
        name: "context",
        description: "Does the prompt provide adequate context?",
        questions: &[
            "Is there sufficient background information?",
            "Does the prompt establish the proper framing?",
            "Is there a clear perspective or role defined?",
            "Does the context align with the request?",
        ],
        weight: 0.15,
    },
    Criterion {
        name: "structure",
        description: "Is the prompt well-structured and organized?",
        questions: &[
            "Is the prompt organized in a logical sequence?",
            "Are different components clearly separated?",
            "Is the prompt formatted for easy reading?",
            "Does the structure support the intent of the prompt?",
        ],
        weight: 0.15,
    },
    Criterion {
        name: "completeness",
        description: "Is the prompt complete with all necessary elements?",
        questions: &[
            "Does the prompt include all required components based on its framework?",
            "Are all relevant parameters specified?",
            "Does the prompt address potential edge cases?",
            "Are examples included where appropriate?",
        ],
        weight: 0.15,
    },
    Criterion {
        name: "effectiveness",
        description: "Is the prompt likely to be effective for its intended purpose?",
        questions: &[
            "Will the prompt likely generate the intended response?",
            "Is the prompt optimized for the specific task?",
            "Does the prompt use the most appropriate techniques?",
            "Is the prompt aligned with best practices for its use case?",
        ],
        weight: 0.10,
    },
];

/// Render the criteria as a scoring rubric
#[must_use]
pub fn rubric() -> String {
    let mut out = String::new();
    for criterion in &CRITERIA {
        out.push_str(&format!(
            "### {} (weight {:.2})\n{}\n",
            criterion.name, criterion.weight, criterion.description
        ));
        for question in criterion.questions {
            out.push_str("- ");
            out.push_str(question);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}
