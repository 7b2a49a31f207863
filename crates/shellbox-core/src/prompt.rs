//! Shell prompt labels (`user@host:dir $`)

use nix::unistd::{getuid, User};
use std::path::Path;

/// Format the prompt label for a working directory.
pub fn format_prompt(working_dir: &Path) -> String {
    let home = dirs::home_dir();
    format!(
        "{}@{}:{} $",
        current_user(),
        current_host(),
        display_path(working_dir, home.as_deref())
    )
}

/// Render `path` with a leading home directory collapsed to `~`.
///
/// Matching is per path component, so `/home/al` does not swallow the
/// prefix of `/home/alice`.
pub fn display_path(path: &Path, home: Option<&Path>) -> String {
    if let Some(home) = home.filter(|h| !h.as_os_str().is_empty()) {
        if let Ok(rest) = path.strip_prefix(home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

fn current_user() -> String {
    if let Ok(Some(user)) = User::from_uid(getuid()) {
        return user.name;
    }
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

fn current_host() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path_home_collapse() {
        let home = Path::new("/home/alice");
        assert_eq!(display_path(Path::new("/home/alice"), Some(home)), "~");
        assert_eq!(
            display_path(Path::new("/home/alice/src/app"), Some(home)),
            "~/src/app"
        );
    }

    #[test]
    fn test_display_path_outside_home() {
        let home = Path::new("/home/alice");
        assert_eq!(display_path(Path::new("/tmp"), Some(home)), "/tmp");
        assert_eq!(
            display_path(Path::new("/home/alice2/x"), Some(home)),
            "/home/alice2/x"
        );
        assert_eq!(display_path(Path::new("/tmp"), None), "/tmp");
    }

    #[test]
    fn test_format_prompt_shape() {
        let prompt = format_prompt(Path::new("/"));
        assert!(prompt.ends_with(":/ $"), "prompt: {}", prompt);
        assert!(prompt.contains('@'));
    }
}
