use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

pub const MAX_STEPS: usize = 5;
pub const MIN_VALID_STEPS: usize = 2;
pub const MIN_PROMPT_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptChainStep {
    /// 1-based position in the chain.
    pub index: usize,
    pub text: String,
}

impl PromptChainStep {
    pub fn is_valid(&self) -> bool { prompt_long_enough(&self.text) }
}

/// Counts characters, not bytes, after trimming surrounding whitespace.
pub fn prompt_long_enough(text: &str) -> bool { text.trim().chars().count() >= MIN_PROMPT_CHARS }

/// Ordered prompts whose images evolve one into the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptChain {
    steps: Vec<PromptChainStep>,
}

impl Default for PromptChain {
    fn default() -> Self {
        let mut chain = Self { steps: Vec::with_capacity(MAX_STEPS) };
        chain.steps.push(PromptChainStep { index: 1, text: String::new() });
        chain.steps.push(PromptChainStep { index: 2, text: String::new() });
        chain
    }
}

impl PromptChain {
    pub fn new() -> Self { Self::default() }

    pub fn from_texts<I, S>(texts: I) -> ClientResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let steps: Vec<PromptChainStep> = texts
            .into_iter()
            .enumerate()
            .map(|(i, t)| PromptChainStep { index: i + 1, text: t.into() })
            .collect();
        if steps.is_empty() || steps.len() > MAX_STEPS {
            return Err(ClientError::validation(format!("A prompt chain needs between 1 and {MAX_STEPS} steps")));
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PromptChainStep] { &self.steps }
    pub fn len(&self) -> usize { self.steps.len() }
    pub fn is_empty(&self) -> bool { self.steps.is_empty() }
    pub fn is_full(&self) -> bool { self.steps.len() >= MAX_STEPS }

    /// Appends an empty step and returns its 1-based index.
    pub fn add_step(&mut self) -> ClientResult<usize> {
        if self.is_full() {
            return Err(ClientError::validation(format!("Maximum {MAX_STEPS} prompts allowed in a chain")));
        }
        let index = self.steps.len() + 1;
        self.steps.push(PromptChainStep { index, text: String::new() });
        Ok(index)
    }

    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> ClientResult<()> {
        let step = index
            .checked_sub(1)
            .and_then(|i| self.steps.get_mut(i))
            .ok_or_else(|| ClientError::validation(format!("No prompt step {index}")))?;
        step.text = text.into();
        Ok(())
    }

    /// Removes a step and renumbers the rest contiguously from 1.
    pub fn remove_step(&mut self, index: usize) -> ClientResult<PromptChainStep> {
        if index == 0 || index > self.steps.len() {
            return Err(ClientError::validation(format!("No prompt step {index}")));
        }
        if self.steps.len() == 1 {
            return Err(ClientError::validation("A prompt chain needs at least one step"));
        }
        let removed = self.steps.remove(index - 1);
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.index = i + 1;
        }
        Ok(removed)
    }

    pub fn valid_count(&self) -> usize { self.steps.iter().filter(|s| s.is_valid()).count() }

    pub fn validate(&self) -> ClientResult<()> {
        if self.valid_count() < MIN_VALID_STEPS {
            return Err(ClientError::validation(format!(
                "Please enter at least {MIN_VALID_STEPS} prompts with {MIN_PROMPT_CHARS}+ characters each"
            )));
        }
        Ok(())
    }

    /// Trimmed texts of the steps that pass validation, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.steps.iter().filter(|s| s.is_valid()).map(|s| s.text.trim().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_valid_step_is_rejected_two_accepted() {
        let mut chain = PromptChain::new();
        chain.set_text(1, "A quiet village at dawn").unwrap();
        assert!(chain.validate().is_err());
        chain.set_text(2, "The village wakes up").unwrap();
        assert!(chain.validate().is_ok());
        assert_eq!(chain.prompts().len(), 2);
    }

    #[test]
    fn short_steps_do_not_count() {
        let chain = PromptChain::from_texts(["A quiet village at dawn", "too short", "Market day in full swing"]).unwrap();
        assert_eq!(chain.valid_count(), 2);
        assert_eq!(chain.prompts(), vec!["A quiet village at dawn", "Market day in full swing"]);
    }

    #[test]
    fn removal_renumbers_contiguously() {
        let mut chain = PromptChain::from_texts(["one one one", "two two two", "three three", "four four four"]).unwrap();
        let removed = chain.remove_step(2).unwrap();
        assert_eq!(removed.text, "two two two");
        let indices: Vec<_> = chain.steps().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(chain.steps()[1].text, "three three");
    }

    #[test]
    fn bounded_between_one_and_five() {
        let mut chain = PromptChain::new();
        while !chain.is_full() {
            chain.add_step().unwrap();
        }
        assert_eq!(chain.len(), MAX_STEPS);
        assert!(chain.add_step().is_err());

        let mut single = PromptChain::from_texts(["only one here"]).unwrap();
        assert!(single.remove_step(1).is_err());
        assert!(single.remove_step(0).is_err());
        assert!(PromptChain::from_texts(Vec::<String>::new()).is_err());
    }

    #[test]
    fn length_counts_chars_after_trim() {
        assert!(!prompt_long_enough("  123456789  "));
        assert!(prompt_long_enough("1234567890"));
        assert!(prompt_long_enough("éééééééééé"));
    }
}
