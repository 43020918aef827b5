//! Prompt-engineering frameworks and the deterministic rules that pick them
//!
//! The data is embedded so a run never depends on files next to the binary.

/// A named prompt structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framework {
    pub name: &'static str,
    pub description: &'static str,
    /// One line used when the framework is recommended during research
    pub summary: &'static str,
    pub structure: &'static [&'static str],
    pub best_for: &'static [&'static str],
    pub example: &'static str,
}

impl Framework {
    /// Multi-line reference block for templates
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("## {} ({})\n\nStructure:\n", self.name, self.description);
        for item in self.structure {
            out.push_str("- ");
            out.push_str(item);
            out.push('\n');
        }
        out.push_str("\nBest for: ");
        out.push_str(&self.best_for.join(", "));
        out.push_str("\n\nExample:\n");
        out.push_str(self.example);
        out.push('\n');
        out
    }
}

pub const PECRA: Framework = Framework {
    name: "PECRA",
    description: "Perspective, Experience, Context, Request, Action framework",
    summary: "Ideal for structured prompts with clear role definition and specific request handling.",
    structure: &[
        "Perspective: Define the role or perspective to adopt",
        "Experience: Specify relevant experience or expertise",
        "Context: Provide context or background information",
        "Request: Clearly state what you want",
        "Action: Specify the desired action or output format",
    ],
    best_for: &["Role-based tasks", "Expert consultations", "Complex outputs"],
    example: "Perspective: You are a senior data scientist\n\
              Experience: With 10+ years in predictive modeling\n\
              Context: Working with a retail dataset of customer purchases\n\
              Request: Analyze purchase patterns\n\
              Action: Provide actionable insights in bullet points",
};

pub const SCQA: Framework = Framework {
    name: "SCQA",
    description: "Situation, Complication, Question, Answer framework",
    summary: "Effective for problem-solving scenarios with clear situation context.",
    structure: &[
        "Situation: Establish the current situation",
        "Complication: Identify the complication or problem",
        "Question: Formulate the key question to address",
        "Answer: Guide towards the desired answer or output",
    ],
    best_for: &[
        "Problem-solving prompts",
        "Business analyses",
        "Decision-making scenarios",
    ],
    example: "Situation: Our e-commerce site has stable traffic\n\
              Complication: But conversion rates dropped 15% last month\n\
              Question: What might be causing this decrease?\n\
              Answer: Provide 3-5 potential causes and solutions",
};

pub const REACT: Framework = Framework {
    name: "ReAct",
    description: "Reasoning and Acting framework",
    summary: "Best for complex reasoning tasks requiring step-by-step thinking.",
    structure: &[
        "Thought: Think step by step about the problem",
        "Action: Define what action to take based on reasoning",
        "Observation: Note what is observed from the action",
        "Next thought/action: Continue the reasoning process",
    ],
    best_for: &[
        "Complex reasoning tasks",
        "Multi-step problems",
        "Logical deductions",
    ],
    example: "I need to solve this math problem: (14 × 6) ÷ (3 + 5)\n\
              Thought: I need to follow order of operations\n\
              Action: First, calculate what's in the parentheses: 3 + 5 = 8\n\
              Observation: The expression is now (14 × 6) ÷ 8\n\
              Thought: Now I'll multiply 14 × 6\n\
              Action: Calculate 14 × 6 = 84\n\
              Observation: The expression is now 84 ÷ 8\n\
              Action: Calculate 84 ÷ 8 = 10.5\n\
              The answer is 10.5",
};

pub const RTF: Framework = Framework {
    name: "RTF",
    description: "Rule of Three Feedback framework",
    summary: "Useful for iterative prompt refinement with feedback loops.",
    structure: &[
        "Round 1: Initial prompt and response",
        "Feedback: Provide specific feedback on what needs improvement",
        "Round 2: Improved prompt based on feedback",
        "Feedback: Second round of focused feedback",
        "Round 3: Final optimized prompt",
    ],
    best_for: &[
        "Iterative development",
        "Creative content",
        "Refining existing prompts",
    ],
    example: "Round 1: Write a short story about a detective\n\
              Feedback: Make the detective more unique and add a surprising twist\n\
              Round 2: Write a short story about a detective who can speak to buildings\n\
              Feedback: Make the ending more satisfying\n\
              Round 3: Write a short story about a detective who can speak to buildings, \
              with a satisfying resolution to the case",
};

pub const RISEN: Framework = Framework {
    name: "RISEN",
    description: "Role, Information, Steps, Example, Negative example framework",
    summary: "Strong for comprehensive instruction following with examples.",
    structure: &[
        "Role: Clearly define the role being assigned",
        "Information: Provide all necessary context and data",
        "Steps: Outline specific steps to follow",
        "Example: Show a positive example of desired output",
        "Negative example: Demonstrate what to avoid",
    ],
    best_for: &[
        "Detailed instructions",
        "Educational content",
        "Technical documentation",
    ],
    example: "Role: You are a technical documentation writer\n\
              Information: We're launching a new API for our payment system\n\
              Steps: 1. Explain authentication process, 2. Detail each endpoint, 3. Provide code examples\n\
              Example: Here's good API documentation: [example]\n\
              Negative example: Avoid vague descriptions like this: [counter-example]",
};

/// All frameworks, in the order explicit mentions are matched
pub static FRAMEWORKS: [Framework; 5] = [PECRA, SCQA, REACT, RTF, RISEN];

/// Look up a framework by name, ignoring case
#[must_use]
pub fn find(name: &str) -> Option<&'static Framework> {
    FRAMEWORKS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

const SELECTION_RULES: [(&[&str], Framework); 4] = [
    (&["problem", "issue", "challenge"], SCQA),
    (&["steps", "guide", "tutorial"], RISEN),
    (&["reason", "think", "logic"], REACT),
    (&["improve", "feedback", "iterate"], RTF),
];

/// Pick the framework the generate stage should use for a request.
///
/// A framework named in the request (as a whole word) wins. Otherwise the
/// first keyword rule that matches decides, and PECRA is the fallback.
#[must_use]
pub fn select_framework(user_input: &str) -> &'static Framework {
    let lowered = user_input.to_lowercase();

    let mentioned = FRAMEWORKS.iter().find(|f| {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word.eq_ignore_ascii_case(f.name))
    });
    if let Some(named) = mentioned {
        return named;
    }

    SELECTION_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .and_then(|(_, framework)| find(framework.name))
        .unwrap_or(&FRAMEWORKS[0])
}

const CONTENT_TYPES: [(&str, &str, [Framework; 2]); 11] = [
    ("write", "writing tasks", [PECRA, RISEN]),
    ("generate", "content generation", [PECRA, RTF]),
    ("create", "creative work", [RTF, PECRA]),
    ("analyze", "analytical tasks", [REACT, SCQA]),
    ("explain", "explanatory content", [RISEN, PECRA]),
    ("summarize", "summarization tasks", [SCQA, REACT]),
    ("creative", "creative content", [RTF, PECRA]),
    ("technical", "technical documentation", [RISEN, SCQA]),
    ("scientific", "scientific content", [REACT, SCQA]),
    ("code", "code generation", [REACT, RISEN]),
    ("business", "business content", [SCQA, PECRA]),
];

/// Content types and frameworks the research stage should focus on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub content_types: Vec<&'static str>,
    pub frameworks: Vec<&'static Framework>,
}

/// Map keywords in the request to content types and their frameworks.
///
/// Frameworks are listed once each, in first-seen order. A request with no
/// known keyword is treated as a general purpose prompt served by PECRA.
#[must_use]
pub fn recommend(user_input: &str) -> Recommendation {
    let lowered = user_input.to_lowercase();
    let mut content_types = Vec::new();
    let mut frameworks: Vec<&'static Framework> = Vec::new();

    for (keyword, content_type, relevant) in &CONTENT_TYPES {
        if !lowered.contains(keyword) {
            continue;
        }
        content_types.push(*content_type);
        for candidate in relevant {
            if let Some(framework) = find(candidate.name)
                && !frameworks.iter().any(|f| f.name == framework.name)
            {
                frameworks.push(framework);
            }
        }
    }

    if content_types.is_empty() {
        content_types.push("general purpose prompts");
        frameworks.push(&FRAMEWORKS[0]);
    }

    Recommendation {
        content_types,
        frameworks,
    }
}
