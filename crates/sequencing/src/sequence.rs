//! Sequence tree: ordered, nestable, optionally gated groups of operations
//!
//! Nodes are only ever created through the builder methods of their parent,
//! so the tree cannot contain shared children or cycles.

use std::fmt;
use std::sync::Arc;

use crate::context::{CancellationToken, Notification, StatusReporter, with_section};
use crate::error::{Error, Result};
use crate::operation::BoxedOperation;
use crate::types::{RunSettings, ServerTarget};

/// Evaluates a condition expression against a server
///
/// Implemented outside the engine (e.g. by running the expression on the
/// server over SSH).
pub trait ConditionEvaluator: Send + Sync {
    /// Evaluate `expression` for `server`
    fn evaluate(&self, server: &ServerTarget, expression: &str) -> anyhow::Result<bool>;
}

type Predicate = Box<dyn Fn(&ServerTarget) -> bool + Send + Sync>;

/// Gate of a conditional sequence, evaluated per server at execution time
pub enum Condition {
    /// In-process test over server metadata
    Predicate {
        /// Human-readable form, used in reports and dry runs
        description: String,
        /// The test itself
        predicate: Predicate,
    },
    /// Expression handed to an external evaluator
    Expression {
        /// Expression text
        expression: String,
        /// Evaluator that runs it
        evaluator: Arc<dyn ConditionEvaluator>,
    },
}

impl Condition {
    /// Gate on a predicate over the server
    pub fn predicate(
        description: impl Into<String>,
        predicate: impl Fn(&ServerTarget) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Predicate {
            description: description.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Gate on an expression evaluated by `evaluator`
    pub fn expression(expression: impl Into<String>, evaluator: Arc<dyn ConditionEvaluator>) -> Self {
        Self::Expression {
            expression: expression.into(),
            evaluator,
        }
    }

    /// Human-readable form of the gate
    pub fn describe(&self) -> &str {
        match self {
            Self::Predicate { description, .. } => description,
            Self::Expression { expression, .. } => expression,
        }
    }

    fn evaluate(&self, server: &ServerTarget) -> Result<bool> {
        match self {
            Self::Predicate { predicate, .. } => Ok(predicate(server)),
            Self::Expression {
                expression,
                evaluator,
            } => evaluator
                .evaluate(server, expression)
                .map_err(|source| Error::Condition {
                    condition: expression.clone(),
                    server: server.name.clone(),
                    source,
                }),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate { description, .. } => {
                f.debug_tuple("Predicate").field(description).finish()
            }
            Self::Expression { expression, .. } => {
                f.debug_tuple("Expression").field(expression).finish()
            }
        }
    }
}

#[derive(Debug)]
enum Step {
    Operation(BoxedOperation),
    /// Index into `CompositeSequence::children`
    Composite(usize),
}

/// Named, ordered group of operations and nested groups
#[derive(Debug)]
pub struct CompositeSequence {
    name: String,
    condition: Option<Condition>,
    steps: Vec<Step>,
    children: Vec<CompositeSequence>,
}

impl CompositeSequence {
    /// Create an empty, ungated sequence
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: None,
            steps: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sequence name, used as its reporting section
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The gate, if this is a conditional sequence
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Append an operation
    pub fn add(&mut self, operation: BoxedOperation) -> &mut Self {
        self.steps.push(Step::Operation(operation));
        self
    }

    /// Prepend an operation
    pub fn add_first(&mut self, operation: BoxedOperation) -> &mut Self {
        self.steps.insert(0, Step::Operation(operation));
        self
    }

    /// Append a nested sequence and return it for population
    pub fn new_composite_sequence(&mut self, name: impl Into<String>) -> &mut Self {
        self.push_composite(Self::new(name))
    }

    /// Append a nested sequence that only runs when `condition` holds
    pub fn new_conditional_composite_sequence(&mut self, condition: Condition) -> &mut Self {
        let name = format!("{} [when {}]", self.name, condition.describe());
        self.push_composite(Self {
            condition: Some(condition),
            ..Self::new(name)
        })
    }

    fn push_composite(&mut self, sequence: Self) -> &mut Self {
        self.children.push(sequence);
        let index = self.children.len() - 1;
        self.steps.push(Step::Composite(index));
        &mut self.children[index]
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the sequence has no children
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every child depth-first, in order.
    ///
    /// Cancellation is checked before each child. A gated sequence whose
    /// condition is false is skipped without error; it needs a server to
    /// evaluate against.
    pub fn execute(
        &self,
        server: Option<&ServerTarget>,
        status: &mut dyn StatusReporter,
        settings: &RunSettings,
        token: &CancellationToken,
    ) -> Result<()> {
        if let Some(condition) = &self.condition {
            let Some(target) = server else {
                return Err(Error::ConditionWithoutServer(self.name.clone()));
            };
            if !condition.evaluate(target)? {
                status.info(&format!(
                    "Skipping '{}': condition '{}' is false on [{}]",
                    self.name,
                    condition.describe(),
                    target.name
                ));
                return Ok(());
            }
        }

        with_section(status, &self.name, |status| {
            for step in &self.steps {
                token.check()?;
                match step {
                    Step::Composite(index) => {
                        self.children[*index].execute(server, status, settings, token)?;
                    }
                    Step::Operation(operation) => {
                        let name = operation.name();
                        with_section(status, &name, |status| {
                            operation.execute(server, status, settings, token)
                        })
                        .map_err(|source| {
                            Error::from_operation(&name, server.map(|s| s.name.as_str()), source)
                        })?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Render what `execute` would do, one section per child
    pub fn dry_run(&self, status: &mut dyn StatusReporter) {
        if let Some(condition) = &self.condition {
            status.info(&format!("only when {}", condition.describe()));
        }
        for step in &self.steps {
            match step {
                Step::Composite(index) => {
                    let sequence = &self.children[*index];
                    status.section_start(&sequence.name);
                    sequence.dry_run(status);
                    status.section_end(&sequence.name, true);
                }
                Step::Operation(operation) => {
                    let name = operation.name();
                    status.section_start(&name);
                    status.info(&operation.dry_run());
                    status.section_end(&name, true);
                }
            }
        }
    }

    /// Validate every child, collecting all diagnostics
    pub fn is_valid(&self, notification: &mut Notification) -> bool {
        self.steps.iter().fold(true, |valid, step| {
            let step_valid = match step {
                Step::Composite(index) => self.children[*index].is_valid(notification),
                Step::Operation(operation) => operation.is_valid(notification),
            };
            valid && step_valid
        })
    }
}
