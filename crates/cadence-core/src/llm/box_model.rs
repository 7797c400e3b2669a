//! BoxChatModel -- object-safe dynamic dispatch wrapper for ChatModel.
//!
//! 1. `ChatModelDyn` is an object-safe mirror of `ChatModel` with boxed futures
//! 2. Blanket-impl `ChatModelDyn` for all `T: ChatModel`
//! 3. `BoxChatModel` wraps `Box<dyn ChatModelDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use cadence_types::llm::{LlmError, ModelRequest, ModelResponse};

use super::model::ChatModel;

pub trait ChatModelDyn: Send + Sync {
    fn provider_dyn(&self) -> &str;

    fn model_name_dyn(&self) -> &str;

    fn invoke_boxed<'a>(
        &'a self,
        request: &'a ModelRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, LlmError>> + Send + 'a>>;
}

impl<T: ChatModel> ChatModelDyn for T {
    fn provider_dyn(&self) -> &str {
        self.provider()
    }

    fn model_name_dyn(&self) -> &str {
        self.model_name()
    }

    fn invoke_boxed<'a>(
        &'a self,
        request: &'a ModelRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.invoke(request))
    }
}

/// Type-erased chat model selected at runtime.
pub struct BoxChatModel {
    inner: Box<dyn ChatModelDyn + Send + Sync>,
}

impl BoxChatModel {
    pub fn new<T: ChatModel + 'static>(model: T) -> Self {
        Self {
            inner: Box::new(model),
        }
    }

    pub fn provider(&self) -> &str {
        self.inner.provider_dyn()
    }

    pub fn model_name(&self) -> &str {
        self.inner.model_name_dyn()
    }

    pub async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        self.inner.invoke_boxed(request).await
    }
}
