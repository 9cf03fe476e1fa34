pub mod ports;
pub mod content_use_case;
pub mod crisis_use_case;
pub mod form_admin_use_case;
pub mod intake_use_case;
pub mod payment_use_case;
pub mod ticket_use_case;
pub mod user_use_case;
