pub mod mailer;
pub mod password;
pub mod session;
pub mod slug;
pub mod storage;
