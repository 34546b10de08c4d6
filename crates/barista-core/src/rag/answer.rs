use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::AgentError;
use crate::llm::{self, LLM};
use crate::rag::{format_passages, Retriever};

pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any drinkware products related to that question.";

/// Answer to a product question together with the passages it was based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnswer {
    pub answer: String,
    pub context: String,
}

#[async_trait]
pub trait ProductQa: Send + Sync {
    async fn answer(&self, question: &str) -> Result<ProductAnswer, AgentError>;
}

/// Retrieves the closest passages and has the model answer from them alone.
pub struct RagAnswerer {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn LLM>,
    top_k: usize,
}

impl RagAnswerer {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn LLM>, top_k: usize) -> Self {
        Self {
            retriever,
            llm,
            top_k,
        }
    }
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the user's question based ONLY on the following context about drinkware products:\n\n\
         <context>\n{}\n</context>\n\n\
         Question: {}\n\
         Answer:",
        context, question
    )
}

#[async_trait]
impl ProductQa for RagAnswerer {
    async fn answer(&self, question: &str) -> Result<ProductAnswer, AgentError> {
        let passages = self.retriever.query(question, self.top_k).await?;
        if passages.is_empty() {
            return Ok(ProductAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                context: String::new(),
            });
        }

        let context = format_passages(&passages);
        let answer = llm::complete(self.llm.as_ref(), build_prompt(&context, question)).await?;
        Ok(ProductAnswer { answer, context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{LLMResponse, Message, Role};
    use crate::llm::ToolMetadata;
    use crate::rag::Passage;
    use std::sync::Mutex;

    struct FixedRetriever(Vec<Passage>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn query(&self, _text: &str, k: usize) -> Result<Vec<Passage>, AgentError> {
            Ok(self.0.iter().take(k).cloned().collect())
        }
    }

    #[derive(Default)]
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LLM for RecordingLlm {
        async fn generate(
            &self,
            messages: Vec<Message>,
            tools: Option<Vec<ToolMetadata>>,
        ) -> Result<LLMResponse, AgentError> {
            assert!(tools.is_none());
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].role, Role::User);
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            Ok(LLMResponse::text(" The All Day Cup costs RM 79.00. "))
        }
    }

    fn passage(content: &str) -> Passage {
        Passage {
            content: content.to_string(),
            source: "listing-0".to_string(),
            score: 0.9,
        }
    }

    #[tokio::test]
    async fn test_answer_uses_only_retrieved_context() {
        let llm = Arc::new(RecordingLlm::default());
        let retriever = Arc::new(FixedRetriever(vec![
            passage("Product: All Day Cup\nPrice: RM 79.00"),
            passage("Product: Ceramic Mug\nPrice: RM 39.00"),
            passage("Product: Tumbler\nPrice: RM 105.00"),
        ]));
        let answerer = RagAnswerer::new(retriever, llm.clone(), 2);

        let answer = answerer.answer("How much is the All Day Cup?").await.unwrap();
        assert_eq!(answer.answer, "The All Day Cup costs RM 79.00.");
        assert_eq!(
            answer.context,
            "Product: All Day Cup\nPrice: RM 79.00\n\nProduct: Ceramic Mug\nPrice: RM 39.00"
        );

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("based ONLY on the following context"));
        assert!(prompts[0].contains("<context>\nProduct: All Day Cup"));
        assert!(!prompts[0].contains("Tumbler"));
        assert!(prompts[0].ends_with("Question: How much is the All Day Cup?\nAnswer:"));
    }

    #[tokio::test]
    async fn test_no_passages_skips_the_model() {
        let llm = Arc::new(RecordingLlm::default());
        let answerer = RagAnswerer::new(Arc::new(FixedRetriever(Vec::new())), llm.clone(), 3);

        let answer = answerer.answer("anything").await.unwrap();
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.context.is_empty());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }
}
