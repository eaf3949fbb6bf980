//! Prompt composition
//!
//! Serializes the enriched graph into a metadata block and wraps it, with
//! a fixed translation instruction and the source text, into the prompt
//! sent to the translator. Output depends only on the inputs: nodes and
//! edges are sorted, never taken in graph insertion order.

use kgt_core::normalize_name;
use kgt_graph::KnowledgeGraph;

/// Metadata line used when the graph has no nodes
pub const NO_ENTITIES: &str = "no entities identified";

pub const DEFAULT_TARGET_LANGUAGE: &str = "Hindi";

// ============================================================================
// Contextual Prompt
// ============================================================================

/// Final translation prompt: metadata, instruction, source text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextualPrompt {
    text: String,
}

impl ContextualPrompt {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl std::fmt::Display for ContextualPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

// ============================================================================
// Prompt Composer
// ============================================================================

/// Builds translation prompts for one target language
#[derive(Debug, Clone)]
pub struct PromptComposer {
    target_language: String,
}

/// Case-insensitive name order, raw spelling as the tiebreak
fn by_name(a: &str, b: &str) -> std::cmp::Ordering {
    normalize_name(a)
        .cmp(&normalize_name(b))
        .then_with(|| a.cmp(b))
}

impl PromptComposer {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
        }
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    /// Render the graph as a metadata block
    pub fn metadata(graph: &KnowledgeGraph) -> String {
        if graph.is_empty() {
            return format!("Entities: {NO_ENTITIES}");
        }

        let mut nodes: Vec<_> = graph.nodes().collect();
        nodes.sort_by(|a, b| by_name(&a.name, &b.name));

        let mut edges = graph.edges();
        edges.sort_by(|a, b| {
            by_name(&a.source, &b.source)
                .then_with(|| by_name(&a.target, &b.target))
                .then_with(|| a.label.cmp(&b.label))
        });

        let mut block = String::from("Entities:\n");
        for node in nodes {
            block.push_str(&format!(
                "- {} ({}, {})\n",
                node.name, node.entity_type, node.gender
            ));
        }

        block.push_str("Relationships:");
        if edges.is_empty() {
            block.push_str(" none");
        } else {
            for edge in edges {
                block.push_str(&format!(
                    "\n- {} --{}--> {}",
                    edge.source, edge.label, edge.target
                ));
            }
        }

        block
    }

    /// Compose the context-enriched prompt
    pub fn compose(&self, text: &str, graph: &KnowledgeGraph) -> ContextualPrompt {
        let lang = &self.target_language;
        let text = PromptBuilder::new()
            .add_metadata(Self::metadata(graph))
            .add_instruction(format!("Translate the text into {lang}."))
            .add_instruction(
                "Use the gender and relationships of the entities in the metadata to choose \
                 correctly gendered words and forms.",
            )
            .add_instruction(format!("Reply with only the {lang} translation."))
            .source_text(text)
            .build();

        ContextualPrompt { text }
    }

    /// Compose a bare translation prompt with no context
    pub fn compose_plain(&self, text: &str) -> String {
        let lang = &self.target_language;
        PromptBuilder::new()
            .add_instruction(format!("Translate the text into {lang}."))
            .add_instruction(format!("Reply with only the {lang} translation."))
            .source_text(text)
            .build()
    }
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_LANGUAGE)
    }
}

// ============================================================================
// Prompt Builder
// ============================================================================

/// Builder for tagged prompts
pub struct PromptBuilder {
    metadata_sections: Vec<String>,
    instructions: Vec<String>,
    source_text: String,
}

impl PromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self {
            metadata_sections: Vec::new(),
            instructions: Vec::new(),
            source_text: String::new(),
        }
    }

    /// Add a metadata section
    pub fn add_metadata(mut self, section: impl Into<String>) -> Self {
        self.metadata_sections.push(section.into());
        self
    }

    /// Add an instruction
    pub fn add_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    /// Set the text to translate, kept verbatim
    pub fn source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = text.into();
        self
    }

    /// Build the final prompt
    pub fn build(self) -> String {
        let mut prompt = String::new();

        if !self.metadata_sections.is_empty() {
            prompt.push_str("<metadata>\n");
            for section in &self.metadata_sections {
                prompt.push_str(section);
                prompt.push('\n');
            }
            prompt.push_str("</metadata>\n\n");
        }

        if !self.instructions.is_empty() {
            prompt.push_str("<instructions>\n");
            for (i, inst) in self.instructions.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, inst));
            }
            prompt.push_str("</instructions>\n\n");
        }

        prompt.push_str("<text>\n");
        prompt.push_str(&self.source_text);
        prompt.push_str("\n</text>\n");

        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
