//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod anomaly;
pub mod chatbot_entry;
pub mod chatbot_session;
pub mod conversation;
pub mod department;
pub mod department_transaction;
pub mod institution;
pub mod message;
pub mod report;
pub mod transaction;
pub mod user;

// Re-export specific types to avoid conflicts
pub use anomaly::{
    AnomalyStatus, Column as AnomalyColumn, Entity as Anomaly, Model as AnomalyModel,
};
pub use chatbot_entry::{
    ChatRole, Column as ChatbotEntryColumn, Entity as ChatbotEntry, Model as ChatbotEntryModel,
};
pub use chatbot_session::{
    Column as ChatbotSessionColumn, Entity as ChatbotSession, Model as ChatbotSessionModel,
};
pub use conversation::{
    Column as ConversationColumn, Entity as Conversation, Model as ConversationModel,
};
pub use department::{Column as DepartmentColumn, Entity as Department, Model as DepartmentModel};
pub use department_transaction::{
    Column as DepartmentTransactionColumn, Entity as DepartmentTransaction,
    Model as DepartmentTransactionModel,
};
pub use institution::{
    Column as InstitutionColumn, Entity as Institution, Model as InstitutionModel,
};
pub use message::{
    Column as MessageColumn, Entity as Message, Model as MessageModel, Participant, SenderKind,
};
pub use report::{Column as ReportColumn, Entity as Report, Model as ReportModel, ReportType};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionStatus,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
