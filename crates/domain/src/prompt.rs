use crate::models::Comment;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REPLY_TEMPLATE: &str = "You are replying to a comment on your blog post \"{post_title}\".\n\
Post summary: {post_summary}\n\
{visitor_name} wrote: {comment}\n\
Write a short, friendly reply. Output only the reply text.";

/// 人格参数，每次生成时从宿主配置读取
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub personality: String,
    pub reply_style: String,
    pub plan_style: String,
    pub states: Vec<String>,
    pub state_probability: f64,
}

impl Persona {
    /// 以 `state_probability` 的概率用随机的一个 state 代替 personality
    pub fn active_personality<R: Rng>(&self, rng: &mut R) -> &str {
        if !self.states.is_empty() && rng.gen::<f64>() < self.state_probability {
            if let Some(state) = self.states.choose(rng) {
                return state;
            }
        }
        &self.personality
    }

    pub fn render<R: Rng>(&self, rng: &mut R) -> String {
        let parts = [
            ("Persona", self.active_personality(rng)),
            ("Style", self.reply_style.as_str()),
            ("Rules", self.plan_style.as_str()),
        ];
        parts
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head)
}

/// 填充 `{post_title}` `{post_summary}` `{visitor_name}` `{comment}`
pub fn render_reply_template(template: &str, comment: &Comment, max_summary_chars: usize) -> String {
    let visitor = if comment.author.trim().is_empty() {
        "Visitor"
    } else {
        comment.author.as_str()
    };
    template
        .replace("{post_title}", &comment.post_title)
        .replace(
            "{post_summary}",
            &truncate_chars(&comment.post_summary, max_summary_chars),
        )
        .replace("{visitor_name}", visitor)
        .replace("{comment}", &comment.body)
}

pub fn build_reply_prompt(persona_block: &str, template: &str, comment: &Comment, max_summary_chars: usize) -> String {
    let base = render_reply_template(template, comment, max_summary_chars);
    if persona_block.is_empty() {
        base
    } else {
        format!("{}\n{}", persona_block, base)
    }
}

/// 目标字数在 base ± 50 之间浮动，下限 100
pub fn target_length<R: Rng>(base: u32, rng: &mut R) -> u32 {
    let low = base.saturating_sub(50).max(100);
    let high = base.saturating_add(50).max(low);
    rng.gen_range(low..=high)
}

pub fn topic_prompt(topic: &str, target_length: u32, personality: &str, style: &str, now: &str) -> String {
    format!(
        "You are {personality}. It is now {now}.\n\
         Write a blog post of about {target_length} words inspired by \"{topic}\". \
         Feel free to wander: everyday details, mood, weather or any fun thought related to it.\n\
         First person, natural and conversational; {style}.\n\
         Do not add any preface, quotes or explanation.\n\n\
         Answer strictly in this format:\n\
         Title: <a one-line title based on what you actually wrote, not just \"{topic}\">\n\
         Body: <the post>\n"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPost {
    pub title: String,
    pub body: String,
}

/// 解析 `Title:` / `Body:`。没有标题用 fallback，没有 Body 标记用全文；全空返回 `None`
pub fn parse_generated_post(text: &str, fallback_title: &str) -> Option<GeneratedPost> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut title = String::new();
    let mut body: Option<Vec<&str>> = None;
    for line in text.lines() {
        if let Some(lines) = body.as_mut() {
            lines.push(line);
        } else if let Some(rest) = line.trim_start().strip_prefix("Title:") {
            title = rest.trim().to_string();
        } else if let Some(rest) = line.trim_start().strip_prefix("Body:") {
            body = Some(vec![rest.trim_start()]);
        }
    }

    let body = match body {
        Some(lines) => lines.join("\n").trim().to_string(),
        None => text.to_string(),
    };
    if body.is_empty() {
        return None;
    }
    if title.is_empty() {
        title = fallback_title.to_string();
    }
    Some(GeneratedPost { title, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn comment() -> Comment {
        Comment {
            id: "c1".into(),
            body: "nice post".into(),
            author: "u1".into(),
            created_at: None,
            post_id: Some("7".into()),
            post_title: "Rust".into(),
            post_summary: "a".repeat(20),
        }
    }

    #[test]
    fn template_placeholders_are_filled() {
        let out = render_reply_template(
            "[{post_title}] {post_summary} / {visitor_name}: {comment}",
            &comment(),
            5,
        );
        assert_eq!(out, "[Rust] aaaaa... / u1: nice post");
    }

    #[test]
    fn anonymous_visitor_gets_placeholder_name() {
        let mut c = comment();
        c.author = " ".into();
        assert_eq!(render_reply_template("{visitor_name}", &c, 10), "Visitor");
    }

    #[test]
    fn persona_block_is_prepended() {
        let persona = Persona {
            personality: "a cheerful cat".into(),
            reply_style: "short".into(),
            ..Persona::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let block = persona.render(&mut rng);
        assert_eq!(block, "Persona: a cheerful cat\nStyle: short");

        let prompt = build_reply_prompt(&block, "{comment}", &comment(), 10);
        assert!(prompt.starts_with("Persona: a cheerful cat\n"));
        assert!(prompt.ends_with("nice post"));
    }

    #[test]
    fn state_probability_bounds() {
        let mut persona = Persona {
            personality: "base".into(),
            states: vec!["sleepy".into()],
            state_probability: 0.0,
            ..Persona::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(persona.active_personality(&mut rng), "base");
        }
        persona.state_probability = 1.0;
        for _ in 0..20 {
            assert_eq!(persona.active_personality(&mut rng), "sleepy");
        }
    }

    #[test]
    fn target_length_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let n = target_length(300, &mut rng);
            assert!((250..=350).contains(&n));
            let small = target_length(60, &mut rng);
            assert!((100..=110).contains(&small));
        }
    }

    #[test]
    fn parses_title_and_multiline_body() {
        let post = parse_generated_post("Title: Rainy Day\nBody: It rained.\nThen it stopped.", "topic").unwrap();
        assert_eq!(post.title, "Rainy Day");
        assert_eq!(post.body, "It rained.\nThen it stopped.");
    }

    #[test]
    fn falls_back_when_markers_missing() {
        let post = parse_generated_post("just some prose", "Coffee").unwrap();
        assert_eq!(post.title, "Coffee");
        assert_eq!(post.body, "just some prose");

        assert!(parse_generated_post("Title: only a title\nBody:   ", "x").is_none());
        assert!(parse_generated_post("   ", "x").is_none());
    }

    #[test]
    fn truncation_counts_chars() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("short", 5), "short");
    }

    #[test]
    fn target_length_saturates_at_the_top() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = target_length(u32::MAX, &mut rng);
        assert!(n >= u32::MAX - 50);
    }
}
