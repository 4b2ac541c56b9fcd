use minijinja::{context, Environment};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.j2");

pub struct SystemPromptContext<'a> {
    pub bot_name: &'a str,
}

pub fn render_system_prompt(ctx: &SystemPromptContext<'_>) -> String {
    let mut env = Environment::new();
    if env
        .add_template("system_prompt", SYSTEM_PROMPT_TEMPLATE)
        .is_err()
    {
        return fallback_system_prompt(ctx);
    }

    let Ok(template) = env.get_template("system_prompt") else {
        return fallback_system_prompt(ctx);
    };

    template
        .render(context! {
            bot_name => display_bot_name(ctx),
        })
        .unwrap_or_else(|_| fallback_system_prompt(ctx))
}

fn display_bot_name<'a>(ctx: &'a SystemPromptContext<'a>) -> &'a str {
    if ctx.bot_name.trim().is_empty() {
        "el asistente del evento"
    } else {
        ctx.bot_name.trim()
    }
}

fn fallback_system_prompt(ctx: &SystemPromptContext<'_>) -> String {
    format!(
        "Eres {}, el asistente virtual de un congreso tecnológico.\n\
         Responde siempre en español, de forma breve y cordial.\n\
         Si no conoces la respuesta, dilo con claridad y no inventes datos.",
        display_bot_name(ctx)
    )
}
