//! Records persisted by the platform and the rules that govern their state.

/// Unit-like enums stored as snake_case text columns.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::AppError;

            fn from_str(s: &str) -> crate::error::Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::AppError::Internal(format!(
                        "unknown {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub(crate) use text_enum;

pub mod alerts;
pub mod content;
pub mod forms;
pub mod payments;
pub mod submissions;
pub mod tickets;
pub mod users;

pub use alerts::{AlertStatus, CrisisAlert};
pub use content::{ContentItem, ContentKind};
pub use forms::{
    ConditionOperator, ConditionRule, Conditions, FieldType, FormField, FormFieldOption,
    FormTemplate, MatchMode, TemplateCategory,
};
pub use payments::{Transaction, TransactionStatus};
pub use submissions::{FormAnswer, FormSubmission, RiskLevel, Urgency};
pub use tickets::{ConsultationTicket, TicketPriority, TicketStatus};
pub use users::{Role, User};
