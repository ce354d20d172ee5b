pub mod telegram;

pub use telegram::TelegramTarget;
