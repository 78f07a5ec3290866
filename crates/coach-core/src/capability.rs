//! The two external capabilities a delivery run depends on.

use crate::error::Result;
use crate::message::OutboundMessage;

/// Prompt in, text out. Failures surface as `GenerationFailed`.
pub trait Generate: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Post a message and return the platform-assigned message id, if the
/// transport reports one. Failures surface as `DeliveryFailed`.
pub trait Deliver: Send + Sync {
    fn deliver(&self, message: &OutboundMessage) -> Result<Option<String>>;
}

impl<T: Generate + ?Sized> Generate for Box<T> {
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}

impl<T: Deliver + ?Sized> Deliver for Box<T> {
    fn deliver(&self, message: &OutboundMessage) -> Result<Option<String>> {
        (**self).deliver(message)
    }
}
