//! Stage sequencing: run a stage's hooks in order, stopping at the first failure.

use ocihook_core::{Hook, HookResult, Spec, Stage};
use tracing::Instrument;

use crate::context::HookContext;
use crate::launcher::HookLauncher;
use crate::runner::HookRunner;

impl<L: HookLauncher> HookRunner<L> {
    /// Run `hooks` for `stage` strictly in declaration order.
    ///
    /// An absent or empty list succeeds without launching anything. The first
    /// failing hook's error is returned unchanged and later hooks never start.
    pub async fn run_stage(
        &self,
        ctx: &HookContext,
        stage: Stage,
        hooks: Option<&[Hook]>,
        id: &str,
        bundle: &str,
    ) -> HookResult<()> {
        let hooks = match hooks {
            Some(hooks) if !hooks.is_empty() => hooks,
            _ => {
                tracing::debug!(%stage, "No hooks declared, skipping");
                return Ok(());
            }
        };

        let span = tracing::debug_span!("stage", %stage, id, count = hooks.len());
        async {
            for (index, hook) in hooks.iter().enumerate() {
                if let Err(e) = self.run_hook(ctx, stage, hook, id, bundle).await {
                    tracing::warn!(index, remaining = hooks.len() - index - 1, "Stage aborted: {e}");
                    return Err(e);
                }
            }
            tracing::debug!("All hooks succeeded");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Run the `prestart` hooks declared in `spec`.
    pub async fn pre_start_hooks(
        &self,
        ctx: &HookContext,
        spec: &Spec,
        id: &str,
        bundle: &str,
    ) -> HookResult<()> {
        self.run_spec_stage(ctx, spec, Stage::Prestart, id, bundle)
            .await
    }

    /// Run the `poststart` hooks declared in `spec`.
    pub async fn post_start_hooks(
        &self,
        ctx: &HookContext,
        spec: &Spec,
        id: &str,
        bundle: &str,
    ) -> HookResult<()> {
        self.run_spec_stage(ctx, spec, Stage::Poststart, id, bundle)
            .await
    }

    /// Run the `poststop` hooks declared in `spec`.
    pub async fn post_stop_hooks(
        &self,
        ctx: &HookContext,
        spec: &Spec,
        id: &str,
        bundle: &str,
    ) -> HookResult<()> {
        self.run_spec_stage(ctx, spec, Stage::Poststop, id, bundle)
            .await
    }

    /// Run `stage` from `spec`, reporting the document's annotations to each hook.
    pub async fn run_spec_stage(
        &self,
        ctx: &HookContext,
        spec: &Spec,
        stage: Stage,
        id: &str,
        bundle: &str,
    ) -> HookResult<()> {
        let hooks = spec.hooks_for(stage);
        if spec.annotations.is_empty() {
            return self.run_stage(ctx, stage, hooks, id, bundle).await;
        }
        let ctx = ctx.clone().with_annotations(spec.annotations.clone());
        self.run_stage(&ctx, stage, hooks, id, bundle).await
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
