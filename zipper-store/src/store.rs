use crate::{
    engine::{Engine, Session},
    error::Result,
};

#[derive(Clone)]
pub struct Store {
    pub(crate) engine: Box<dyn Engine>,
}

impl Store {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    pub async fn begin(&self) -> Result<Box<dyn Session>> {
        self.engine.begin().await
    }
}
