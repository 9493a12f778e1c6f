//! Admin command parsing and reply rendering. Pure text in, text out.

use crate::migration::{MessageError, MigrationError, MigrationResult};
use crate::model::ChannelId;
use crate::store::messages::RecentMessage;
use crate::store::stats::{ChannelSummary, DatabaseStats, DetailedStats, TopicStat};

pub const NOT_AUTHORIZED: &str = "⛔ You are not authorized to use this command.";

const DEFAULT_RECENT: usize = 10;
const MAX_RECENT: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    Status,
    Stats,
    Recent { limit: usize },
    ListGroups,
    ListTopics { channel: ChannelId },
    Reinitialize { source: ChannelId, target: ChannelId },
    /// `/reinitialize` without arguments: pick groups with buttons.
    ReinitializeMenu,
}

impl Command {
    pub fn requires_admin(&self) -> bool {
        !matches!(self, Command::Start | Command::Help)
    }
}

fn split_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// `None` when `text` is not one of our commands; `Some(Err(usage))` when the
/// arguments are wrong.
pub fn parse_command(text: &str) -> Option<Result<Command, String>> {
    if !text.trim_start().starts_with('/') {
        return None;
    }
    let (cmd, rest) = split_command(text);
    let args: Vec<&str> = rest.split_whitespace().collect();

    let parsed = match cmd.as_str() {
        "start" => Ok(Command::Start),
        "help" => Ok(Command::Help),
        "status" => Ok(Command::Status),
        "stats" => Ok(Command::Stats),
        "recent" => {
            let limit = args
                .first()
                .and_then(|a| a.parse::<usize>().ok())
                .unwrap_or(DEFAULT_RECENT)
                .min(MAX_RECENT);
            Ok(Command::Recent { limit })
        }
        "list_groups" => Ok(Command::ListGroups),
        "list_topics" => match args.as_slice() {
            [id] => id
                .parse::<i64>()
                .map(|id| Command::ListTopics {
                    channel: ChannelId(id),
                })
                .map_err(|_| "❌ Group ID must be a valid integer.".to_string()),
            _ => Err("❌ Invalid usage.\n\n\
                      Usage: /list_topics <group_id>\n\n\
                      Example: /list_topics -1001234567890\n\n\
                      Use /list_groups to get group IDs."
                .to_string()),
        },
        "reinitialize" => match args.as_slice() {
            [] => Ok(Command::ReinitializeMenu),
            [source, target] => match (source.parse::<i64>(), target.parse::<i64>()) {
                (Ok(s), Ok(t)) => Ok(Command::Reinitialize {
                    source: ChannelId(s),
                    target: ChannelId(t),
                }),
                _ => Err("❌ Group IDs must be valid integers.".to_string()),
            },
            _ => Err("❌ Invalid usage.\n\n\
                      Usage: /reinitialize <source_group_id> <target_group_id>\n\n\
                      Example: /reinitialize -1001234567890 -1009876543210"
                .to_string()),
        },
        _ => return None,
    };
    Some(parsed)
}

/// Inline keyboard steps of the interactive `/reinitialize` flow. The ids
/// travel in the callback data, so no per-user state is kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuAction {
    /// Back to the source list.
    Restart,
    PickSource(ChannelId),
    PickTarget { source: ChannelId, target: ChannelId },
    Confirm { source: ChannelId, target: ChannelId },
    Cancel,
}

impl MenuAction {
    pub fn to_data(self) -> String {
        match self {
            MenuAction::Restart => "rm".to_string(),
            MenuAction::PickSource(s) => format!("rs:{}", s),
            MenuAction::PickTarget { source, target } => format!("rt:{}:{}", source, target),
            MenuAction::Confirm { source, target } => format!("rr:{}:{}", source, target),
            MenuAction::Cancel => "rc".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        let tag = parts.next()?;
        let mut id = || -> Option<ChannelId> { parts.next()?.parse().ok().map(ChannelId) };
        let action = match tag {
            "rm" => MenuAction::Restart,
            "rs" => MenuAction::PickSource(id()?),
            "rt" => MenuAction::PickTarget {
                source: id()?,
                target: id()?,
            },
            "rr" => MenuAction::Confirm {
                source: id()?,
                target: id()?,
            },
            "rc" => MenuAction::Cancel,
            _ => return None,
        };
        Some(action)
    }
}

/// Text plus one button per row for a step of the `/reinitialize` menu.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuView {
    pub text: String,
    pub buttons: Vec<(String, MenuAction)>,
}

fn group_label(group: &ChannelSummary) -> String {
    group
        .name
        .clone()
        .unwrap_or_else(|| format!("Group {}", group.id))
}

fn cancel_button() -> (String, MenuAction) {
    ("❌ Cancel".to_string(), MenuAction::Cancel)
}

/// Step 1. `Err` carries the reply when fewer than two groups are known.
pub fn source_menu(groups: &[ChannelSummary]) -> Result<MenuView, String> {
    if groups.len() < 2 {
        return Err(format!(
            "❌ You need at least 2 groups to reinitialize.\n\
             Currently monitoring: {} group(s)",
            groups.len()
        ));
    }
    let mut buttons: Vec<_> = groups
        .iter()
        .map(|g| {
            (
                format!("{} ({} msgs)", group_label(g), g.message_count),
                MenuAction::PickSource(g.id),
            )
        })
        .collect();
    buttons.push(cancel_button());
    Ok(MenuView {
        text: "🔄 Reinitialize: Step 1/2\n\n\
               Select the source group (where to copy messages FROM):"
            .to_string(),
        buttons,
    })
}

/// Step 2: every other group is a possible target.
pub fn target_menu(source: ChannelId, groups: &[ChannelSummary]) -> Result<MenuView, String> {
    let src = groups
        .iter()
        .find(|g| g.id == source)
        .ok_or_else(|| "❌ Source group not found.".to_string())?;
    let mut buttons: Vec<_> = groups
        .iter()
        .filter(|g| g.id != source)
        .map(|g| (group_label(g), MenuAction::PickTarget { source, target: g.id }))
        .collect();
    buttons.push(("◀️ Back".to_string(), MenuAction::Restart));
    buttons.push(cancel_button());
    Ok(MenuView {
        text: format!(
            "🔄 Reinitialize: Step 2/2\n\n\
             ✅ Source: {} ({} messages)\n\n\
             Select the target group (where to copy messages TO):",
            group_label(src),
            src.message_count
        ),
        buttons,
    })
}

pub fn confirm_menu(
    source: ChannelId,
    target: ChannelId,
    groups: &[ChannelSummary],
) -> Result<MenuView, String> {
    let src = groups
        .iter()
        .find(|g| g.id == source)
        .ok_or_else(|| "❌ Source group not found.".to_string())?;
    let dst = groups
        .iter()
        .find(|g| g.id == target)
        .ok_or_else(|| "❌ Target group not found.".to_string())?;
    Ok(MenuView {
        text: format!(
            "🔄 Ready to Reinitialize\n\n\
             📤 Source: {}\n\
             📥 Target: {}\n\
             📊 Messages: {}\n\n\
             ⚠️ This will copy all messages and topics to the target group.\n\n\
             Proceed?",
            group_label(src),
            group_label(dst),
            src.message_count
        ),
        buttons: vec![
            (
                "✅ Start Reinitialize".to_string(),
                MenuAction::Confirm { source, target },
            ),
            ("◀️ Back".to_string(), MenuAction::PickSource(source)),
            cancel_button(),
        ],
    })
}

pub fn render_start(first_name: &str) -> String {
    format!(
        "👋 Hello {}!\n\n\
         I'm a message capture bot. Add me to your groups to start capturing messages.\n\n\
         Features:\n\
         • Automatic message capture from groups\n\
         • Support for forum topics\n\
         • Group migration with /reinitialize\n\n\
         Admin Commands:\n\
         /status - Database statistics\n\
         /stats - Detailed statistics\n\
         /recent [N] - Show last N messages (default 10)\n\
         /list_groups - List all monitored groups\n\
         /list_topics <group_id> - Show topics in a group\n\
         /reinitialize - Migrate a group into another one\n\n\
         Setup:\n\
         1. Add me to your group\n\
         2. Make me an admin\n\
         3. Messages will be captured automatically",
        first_name
    )
}

pub fn render_help() -> String {
    "🤖 Bot Help\n\n\
     For Everyone:\n\
     /start - Start the bot and see welcome message\n\
     /help - Show this help message\n\n\
     For Admins:\n\
     /status - Show database statistics\n\
     /stats - Detailed statistics\n\
     /recent [N] - Show the last N captured messages\n\
     /list_groups - List all monitored groups\n\
     /list_topics <group_id> - Show topics in a specific group\n\
     /reinitialize <source_id> <target_id> - Migrate messages from one group to another\n\
     /reinitialize - Pick source and target groups with buttons\n\n\
     Example:\n\
     /reinitialize -1001234567890 -1009876543210\n\n\
     This will copy all messages from the source group to the target group."
        .to_string()
}

pub fn render_status(stats: &DatabaseStats) -> String {
    format!(
        "📊 Database Status\n\n\
         Groups monitored: {}\n\
         Total topics: {}\n\
         Total messages: {}",
        stats.channels, stats.topics, stats.messages
    )
}

pub fn render_groups(groups: &[ChannelSummary]) -> String {
    if groups.is_empty() {
        return "📋 No groups are being monitored yet.".to_string();
    }
    let mut out = String::from("📋 Monitored Groups:\n\n");
    for group in groups {
        out.push_str(&format!(
            "• {}\n  ID: {}\n  Messages: {}\n  Topics: {}\n\n",
            group.name.as_deref().unwrap_or("Unnamed group"),
            group.id,
            group.message_count,
            group.topic_count
        ));
    }
    out.trim_end().to_string()
}

pub fn render_topics(channel: ChannelId, name: Option<&str>, topics: &[TopicStat]) -> String {
    let name = name.unwrap_or("Unnamed group");
    if topics.is_empty() {
        return format!(
            "📋 Topics in {}\n\nNo messages captured yet for this group.",
            name
        );
    }

    let mut out = format!("📋 Topics in {}\nGroup ID: {}\n\n", name, channel);
    let mut total = 0;
    for topic in topics {
        total += topic.message_count;
        match topic.topic_id {
            None => out.push_str(&format!("📌 {} (No topic)\n", topic.name)),
            Some(id) => out.push_str(&format!("📌 {}\n   Topic ID: {}\n", topic.name, id)),
        }
        out.push_str(&format!("   Messages: {}\n\n", topic.message_count));
    }
    out.push_str(&format!("Total Messages: {}", total));
    out
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

pub fn render_recent(messages: &[RecentMessage]) -> String {
    if messages.is_empty() {
        return "📭 No messages in database yet.".to_string();
    }

    let mut out = format!("📬 Recent {} Messages\n\n", messages.len());
    for recent in messages {
        let msg = &recent.message;
        let (kind, text, caption, _) = msg.content.to_parts();
        let body = match (text, caption) {
            (Some(text), _) if !text.is_empty() => preview(text, 50),
            (_, Some(caption)) => format!("[{}] {}", kind, preview(caption, 30)),
            _ => format!("[{}]", kind),
        };
        let topic = recent
            .topic_name
            .as_deref()
            .map(|t| format!(" • {}", t))
            .unwrap_or_default();

        out.push_str(&format!(
            "🔹 {}{}\n   👤 {} • {}\n   💬 {}\n\n",
            recent.channel_name.as_deref().unwrap_or("Unnamed group"),
            topic,
            msg.sender.display_name(),
            msg.timestamp.format("%Y-%m-%d %H:%M"),
            body
        ));
    }
    out.trim_end().to_string()
}

pub fn render_stats(stats: &DetailedStats) -> String {
    let mut out = format!(
        "📊 Detailed Statistics\n\n\
         📝 Total Messages: {}\n\
         👥 Groups Monitored: {}\n\
         📌 Forum Topics: {}\n",
        stats.total_messages, stats.total_channels, stats.total_topics
    );

    if !stats.by_kind.is_empty() {
        out.push_str("\n📂 Message Types:\n");
        for (kind, count) in &stats.by_kind {
            let pct = if stats.total_messages > 0 {
                *count as f64 / stats.total_messages as f64 * 100.0
            } else {
                0.0
            };
            out.push_str(&format!("   • {}: {} ({:.1}%)\n", kind, count, pct));
        }
    }

    if !stats.active_channels.is_empty() {
        out.push_str("\n🔥 Most Active Groups:\n");
        for (idx, (name, count)) in stats.active_channels.iter().enumerate() {
            out.push_str(&format!(
                "   {}. {}: {} messages\n",
                idx + 1,
                name.as_deref().unwrap_or("Unnamed group"),
                count
            ));
        }
    }

    if !stats.active_topics.is_empty() {
        out.push_str("\n💬 Most Active Topics:\n");
        for (idx, (topic, group, count)) in stats.active_topics.iter().enumerate() {
            out.push_str(&format!(
                "   {}. {} ({}): {}\n",
                idx + 1,
                topic.as_deref().unwrap_or("Unnamed topic"),
                group.as_deref().unwrap_or("Unnamed group"),
                count
            ));
        }
    }
    out.trim_end().to_string()
}

pub fn render_migration_started(source: ChannelId, target: ChannelId) -> String {
    format!(
        "🔄 Starting reinitialization...\n\nSource: {}\nTarget: {}\n\nPlease wait...",
        source, target
    )
}

pub fn render_progress(current: usize, total: usize) -> String {
    let pct = if total > 0 {
        current as f64 / total as f64 * 100.0
    } else {
        100.0
    };
    format!(
        "🔄 Reinitialization in progress...\n\n\
         Progress: {}/{} messages\n\
         Percentage: {:.1}%",
        current, total, pct
    )
}

pub fn render_result(result: &MigrationResult, error_preview: usize) -> String {
    let mut out = format!(
        "✅ Reinitialization Complete\n\n\
         Messages sent: {}\n\
         Messages failed: {}\n\
         Topics created: {}\n",
        result.sent, result.failed, result.topics_created
    );

    if !result.errors.is_empty() {
        out.push_str(&format!(
            "\n⚠️ Errors encountered: {}\n",
            result.errors.len()
        ));
        for MessageError { message_id, error } in result.errors.iter().take(error_preview) {
            out.push_str(&format!("• Message {}: {}\n", message_id, error));
        }
        if result.errors.len() > error_preview {
            out.push_str(&format!(
                "• ... and {} more errors\n",
                result.errors.len() - error_preview
            ));
        }
    }
    out.trim_end().to_string()
}

pub fn render_failure(err: &MigrationError) -> String {
    match err {
        MigrationError::NotFound(_) | MigrationError::EmptySource(_) => {
            format!("❌ Reinitialization Failed\n\n{}", err)
        }
        MigrationError::Store(_) => format!(
            "❌ Reinitialization Failed\n\n\
             Error: {}\n\n\
             Please check that:\n\
             • The bot is a member of both groups\n\
             • The bot has admin rights in both groups\n\
             • The group IDs are correct",
            err
        ),
    }
}
