use super::{FillContext, FillStrategy};
use crate::result::FillResult;
use async_trait::async_trait;

/// Plain text input: clear, then type the value verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct InputFill;

#[async_trait]
impl FillStrategy for InputFill {
    async fn fill(&self, ctx: &FillContext<'_>, value: &str) -> FillResult<()> {
        let el = ctx.resolve().await?;
        if let Err(err) = ctx.driver.clear(&el).await {
            tracing::debug!(field = %ctx.field, error = %err, "clear failed, typing over");
        }
        ctx.driver.send_keys(&el, value).await?;
        Ok(())
    }
}
