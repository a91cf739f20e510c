//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.
//! Cross-table references are plain ids; the owning side is always the project.

pub mod draft_change;
pub mod product;
pub mod project;
pub mod project_input;
pub mod project_product;
pub mod project_product_group;
pub mod task;

// Re-export specific types to avoid conflicts
pub use draft_change::{
    Column as DraftChangeColumn, Entity as DraftChange, Model as DraftChangeModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use project::{Column as ProjectColumn, Entity as Project, Model as ProjectModel};
pub use project_input::{
    Column as ProjectInputColumn, Entity as ProjectInput, Model as ProjectInputModel,
};
pub use project_product::{
    Column as ProjectProductColumn, Entity as ProjectProduct, Model as ProjectProductModel,
};
pub use project_product_group::{
    Column as ProjectProductGroupColumn, Entity as ProjectProductGroup,
    Model as ProjectProductGroupModel,
};
pub use task::{Column as TaskColumn, Entity as Task, Model as TaskModel};
