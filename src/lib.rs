pub mod config;
pub mod credentials;
pub mod editor;
pub mod error;
pub mod events;
pub mod panel;
pub mod scene;
pub mod processing {
    pub mod color;
    pub mod filters;
    pub mod layout;
}
pub mod render {
    pub mod export;
    pub mod text;
}
pub mod tasks {
    pub mod busy;
    pub mod dispatcher;
    pub mod generate;
    pub mod loader;
}
