pub mod captcha;
pub mod notifier;

pub use captcha::{DisabledCaptcha, RecaptchaVerifier};
pub use notifier::{LogNotifier, WebhookNotifier};
