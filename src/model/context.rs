//! Context reference counters.
//!
//! Every counter is always present (zero by default) so aggregation can sum
//! records without checking which fields a given log format populated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kinds of editor context a turn can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextKind {
    /// `#file` references.
    File,
    /// `#selection` references.
    Selection,
    /// `#symbol` references.
    Symbol,
    /// `#codebase` references.
    Codebase,
    /// `@workspace` participant.
    Workspace,
    /// `@terminal` participant.
    Terminal,
    /// `@vscode` participant.
    Vscode,
    /// `#terminalLastCommand` references.
    TerminalLastCommand,
    /// `#terminalSelection` references.
    TerminalSelection,
    /// `#clipboard` references.
    Clipboard,
    /// `#changes` references.
    Changes,
    /// `#outputPanel` references.
    OutputPanel,
    /// `#problemsPanel` references.
    ProblemsPanel,
    /// Selection attached implicitly by the editor.
    ImplicitSelection,
    /// `copilot-instructions.md` attached as context.
    CopilotInstructions,
    /// `AGENTS.md` attached as context.
    AgentsMd,
}

/// Fixed-shape tally of context references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextReferenceUsage {
    /// `#file` references.
    pub file: u64,
    /// `#selection` references.
    pub selection: u64,
    /// `#symbol` references.
    pub symbol: u64,
    /// `#codebase` references.
    pub codebase: u64,
    /// `@workspace` references.
    pub workspace: u64,
    /// `@terminal` references.
    pub terminal: u64,
    /// `@vscode` references.
    pub vscode: u64,
    /// `#terminalLastCommand` references.
    pub terminal_last_command: u64,
    /// `#terminalSelection` references.
    pub terminal_selection: u64,
    /// `#clipboard` references.
    pub clipboard: u64,
    /// `#changes` references.
    pub changes: u64,
    /// `#outputPanel` references.
    pub output_panel: u64,
    /// `#problemsPanel` references.
    pub problems_panel: u64,
    /// Implicit selections.
    pub implicit_selection: u64,
    /// `copilot-instructions.md` attachments.
    pub copilot_instructions: u64,
    /// `AGENTS.md` attachments.
    pub agents_md: u64,
    /// Occurrences keyed by the literal reference string.
    pub by_path: BTreeMap<String, u64>,
}

impl ContextReferenceUsage {
    /// Increment the counter for `kind` by one.
    pub fn record(&mut self, kind: ContextKind) {
        *self.counter_mut(kind) += 1;
    }

    /// Record a literal reference (path or URI).
    pub fn record_path(&mut self, reference: impl Into<String>) {
        *self.by_path.entry(reference.into()).or_insert(0) += 1;
    }

    /// Read a single counter.
    #[must_use]
    pub fn get(&self, kind: ContextKind) -> u64 {
        match kind {
            ContextKind::File => self.file,
            ContextKind::Selection => self.selection,
            ContextKind::Symbol => self.symbol,
            ContextKind::Codebase => self.codebase,
            ContextKind::Workspace => self.workspace,
            ContextKind::Terminal => self.terminal,
            ContextKind::Vscode => self.vscode,
            ContextKind::TerminalLastCommand => self.terminal_last_command,
            ContextKind::TerminalSelection => self.terminal_selection,
            ContextKind::Clipboard => self.clipboard,
            ContextKind::Changes => self.changes,
            ContextKind::OutputPanel => self.output_panel,
            ContextKind::ProblemsPanel => self.problems_panel,
            ContextKind::ImplicitSelection => self.implicit_selection,
            ContextKind::CopilotInstructions => self.copilot_instructions,
            ContextKind::AgentsMd => self.agents_md,
        }
    }

    fn counter_mut(&mut self, kind: ContextKind) -> &mut u64 {
        match kind {
            ContextKind::File => &mut self.file,
            ContextKind::Selection => &mut self.selection,
            ContextKind::Symbol => &mut self.symbol,
            ContextKind::Codebase => &mut self.codebase,
            ContextKind::Workspace => &mut self.workspace,
            ContextKind::Terminal => &mut self.terminal,
            ContextKind::Vscode => &mut self.vscode,
            ContextKind::TerminalLastCommand => &mut self.terminal_last_command,
            ContextKind::TerminalSelection => &mut self.terminal_selection,
            ContextKind::Clipboard => &mut self.clipboard,
            ContextKind::Changes => &mut self.changes,
            ContextKind::OutputPanel => &mut self.output_panel,
            ContextKind::ProblemsPanel => &mut self.problems_panel,
            ContextKind::ImplicitSelection => &mut self.implicit_selection,
            ContextKind::CopilotInstructions => &mut self.copilot_instructions,
            ContextKind::AgentsMd => &mut self.agents_md,
        }
    }

    /// Sum of all fixed counters (excludes `by_path`).
    #[must_use]
    pub fn total(&self) -> u64 {
        self.file
            + self.selection
            + self.symbol
            + self.codebase
            + self.workspace
            + self.terminal
            + self.vscode
            + self.terminal_last_command
            + self.terminal_selection
            + self.clipboard
            + self.changes
            + self.output_panel
            + self.problems_panel
            + self.implicit_selection
            + self.copilot_instructions
            + self.agents_md
    }

    /// Accumulate another tally into this one.
    pub fn merge(&mut self, other: &Self) {
        self.file += other.file;
        self.selection += other.selection;
        self.symbol += other.symbol;
        self.codebase += other.codebase;
        self.workspace += other.workspace;
        self.terminal += other.terminal;
        self.vscode += other.vscode;
        self.terminal_last_command += other.terminal_last_command;
        self.terminal_selection += other.terminal_selection;
        self.clipboard += other.clipboard;
        self.changes += other.changes;
        self.output_panel += other.output_panel;
        self.problems_panel += other.problems_panel;
        self.implicit_selection += other.implicit_selection;
        self.copilot_instructions += other.copilot_instructions;
        self.agents_md += other.agents_md;

        for (path, count) in &other.by_path {
            *self.by_path.entry(path.clone()).or_insert(0) += count;
        }
    }
}
