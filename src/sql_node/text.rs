use crate::{
    Error,
    context::{Composer, DynamicContext},
    property::to_text,
    scanner::INTERPOLATION,
};

pub(super) fn apply_static(
    text: &str,
    ctx: &mut DynamicContext<'_>,
    composer: &mut Composer<'_>,
) -> Result<bool, Error> {
    let sql = composer.collect_placeholders(text, ctx)?;
    ctx.append_sql(&sql);
    Ok(true)
}

/// Inlines every `${...}` value as text, then handles placeholders in the
/// result.
pub(super) fn apply_interpolated(
    text: &str,
    ctx: &mut DynamicContext<'_>,
    composer: &mut Composer<'_>,
) -> Result<bool, Error> {
    let config = composer.config();
    let scope: &DynamicContext<'_> = ctx;
    let interpolated = INTERPOLATION.parse(text, |expression| {
        let value = config.evaluator().evaluate_value(expression, scope)?;
        let text = to_text(&value);
        config.check_injection(&text)?;
        Ok::<_, Error>(text)
    })?;
    apply_static(&interpolated, ctx, composer)
}
