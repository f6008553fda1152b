pub mod fetch;
pub mod tool;

use crate::Offpack;

#[allow(async_fn_in_trait)]
pub trait Execute {
    async fn execute(app: &Offpack, cmd: Self) -> anyhow::Result<()>;
}
