//! Ordered, multi-strategy element location.
//!
//! The portal's markup is not under our control and changes between account
//! states, so every logical target is described by a [`LocatorSpec`]: a list
//! of structural CSS candidates followed by a list of visible-text probes.
//! Candidates are tried strictly in that order and the first hit wins. A probe
//! that errors is treated as "absent" and never retried within the same call.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::driver::{PageDriver, Target};

/// Delay between attempts when waiting for a target to appear.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Case-insensitive substring match against the visible text of `tags`.
#[derive(Debug, Clone, Copy)]
pub struct TextProbe {
    /// CSS selector list the text is read from, e.g. `"a, button"`.
    pub tags: &'static str,
    /// Lowercase needle.
    pub needle: &'static str,
}

#[derive(Debug)]
pub struct LocatorSpec {
    /// Logical name used in logs, e.g. `"password field"`.
    pub name: &'static str,
    pub structural: &'static [&'static str],
    pub textual: &'static [TextProbe],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Structural,
    Textual,
}

/// A resolved candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub target: Target,
    pub strategy: Strategy,
    /// Visible text of the element at the time it was found.
    pub text: String,
}

impl LocatorSpec {
    /// First element matched by any candidate.
    pub async fn locate(&self, page: &dyn PageDriver) -> Option<Located> {
        self.locate_where(page, |_| true).await
    }

    /// First element matched by any candidate whose visible text satisfies `accept`.
    pub async fn locate_where<F>(&self, page: &dyn PageDriver, accept: F) -> Option<Located>
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        for selector in self.structural {
            let Some(texts) = self.probe(page, selector).await else {
                continue;
            };
            if let Some(index) = texts.iter().position(|text| accept(text.as_str())) {
                debug!(target_name = self.name, selector, index, "located by structure");
                return Some(Located {
                    target: Target::new(*selector, index),
                    strategy: Strategy::Structural,
                    text: texts[index].clone(),
                });
            }
        }

        for probe in self.textual {
            let Some(texts) = self.probe(page, probe.tags).await else {
                continue;
            };
            let hit = texts
                .iter()
                .position(|text| text.to_lowercase().contains(probe.needle) && accept(text.as_str()));
            if let Some(index) = hit {
                debug!(
                    target_name = self.name,
                    tags = probe.tags,
                    needle = probe.needle,
                    index,
                    "located by text"
                );
                return Some(Located {
                    target: Target::new(probe.tags, index),
                    strategy: Strategy::Textual,
                    text: texts[index].clone(),
                });
            }
        }

        trace!(target_name = self.name, "no candidate matched");
        None
    }

    /// Poll [`Self::locate`] until it succeeds or `timeout` elapses.
    pub async fn locate_within(&self, page: &dyn PageDriver, timeout: Duration) -> Option<Located> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.locate(page).await {
                return Some(found);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(target_name = self.name, ?timeout, "gave up waiting for element");
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Non-empty texts of every element matched by the structural candidates,
    /// in candidate order, without duplicates.
    pub async fn collect_texts(&self, page: &dyn PageDriver) -> Vec<String> {
        let mut collected: Vec<String> = Vec::new();
        for selector in self.structural {
            let Some(texts) = self.probe(page, selector).await else {
                continue;
            };
            for text in texts {
                if !text.is_empty() && !collected.contains(&text) {
                    collected.push(text);
                }
            }
        }
        collected
    }

    async fn probe(&self, page: &dyn PageDriver, selector: &str) -> Option<Vec<String>> {
        match page.query_texts(selector).await {
            Ok(texts) => Some(texts),
            Err(e) => {
                trace!(target_name = self.name, selector, error = %e, "probe failed, treating as absent");
                None
            }
        }
    }
}

/// Known locations of everything the login and navigation flows touch.
pub mod catalog {
    use super::{LocatorSpec, TextProbe};

    pub const USERNAME_FIELD: LocatorSpec = LocatorSpec {
        name: "username field",
        structural: &[
            r#"input[name="txtUserName"]"#,
            r#"input[id*="UserName"]"#,
            r#"input[name="username"]"#,
        ],
        textual: &[],
    };

    pub const NEXT_BUTTON: LocatorSpec = LocatorSpec {
        name: "next button",
        structural: &[
            r#"input[name="btnNext"]"#,
            r#"input[id*="btnNext"]"#,
            r#"input[value="Next"]"#,
        ],
        textual: &[TextProbe {
            tags: "button",
            needle: "next",
        }],
    };

    pub const PASSWORD_FIELD: LocatorSpec = LocatorSpec {
        name: "password field",
        structural: &[
            r#"input[name="txtPassword"]"#,
            r#"input[name="txtpassword"]"#,
            r#"input[name="password"]"#,
            r#"input[name="pwd"]"#,
            r#"input[type="password"]"#,
        ],
        textual: &[],
    };

    pub const SUBMIT_BUTTON: LocatorSpec = LocatorSpec {
        name: "login button",
        structural: &[
            r#"input[type="submit"]"#,
            r#"input[name="btnLogin"]"#,
            r#"input[name="btnSubmit"]"#,
            r#"button[type="submit"]"#,
            r#"input[value*="Login"]"#,
            r#"input[value*="login"]"#,
        ],
        textual: &[
            TextProbe {
                tags: "button",
                needle: "login",
            },
            TextProbe {
                tags: "button",
                needle: "sign in",
            },
        ],
    };

    pub const ERROR_SURFACE: LocatorSpec = LocatorSpec {
        name: "error message",
        structural: &[
            ".error",
            ".alert-danger",
            ".text-danger",
            r#"[id*="error"]"#,
            r#"[class*="error"]"#,
            r#"[id*="Error"]"#,
            r#"[class*="Error"]"#,
            ".message",
            ".msg",
            r#"span[style*="color:red"]"#,
            r#"span[style*="color: red"]"#,
            r#"div[style*="color:red"]"#,
            r#"div[style*="color: red"]"#,
        ],
        textual: &[],
    };

    pub const LOGOUT_INDICATOR: LocatorSpec = LocatorSpec {
        name: "logout indicator",
        structural: &[
            r#"a[href*="logout"]"#,
            r#"a[href*="Logout"]"#,
            r#"[id*="logout"]"#,
            r#"[class*="logout"]"#,
            r#"[id*="Logout"]"#,
        ],
        textual: &[
            TextProbe {
                tags: "a, button",
                needle: "logout",
            },
            TextProbe {
                tags: "a, button",
                needle: "log out",
            },
        ],
    };

    pub const WELCOME_INDICATOR: LocatorSpec = LocatorSpec {
        name: "welcome indicator",
        structural: &[
            r#"[id*="welcome"]"#,
            r#"[class*="welcome"]"#,
            r#"[id*="name"]"#,
            r#"[class*="name"]"#,
            ".student-name",
            ".user-name",
        ],
        textual: &[TextProbe {
            tags: "span, div",
            needle: "welcome",
        }],
    };

    pub const ATTENDANCE_GRID: LocatorSpec = LocatorSpec {
        name: "attendance grid",
        structural: &[r#"table[id*="grdOverallAtt"]"#],
        textual: &[],
    };

    pub const ACADEMICS_MENU: LocatorSpec = LocatorSpec {
        name: "academics menu",
        structural: &[
            r#"a[href*="academic"]"#,
            r#"a[href*="Academic"]"#,
            r#"[id*="academic"]"#,
            r#"[class*="academic"]"#,
        ],
        textual: &[TextProbe {
            tags: "a, li, span",
            needle: "academic",
        }],
    };

    pub const OVERALL_ATTENDANCE_LINK: LocatorSpec = LocatorSpec {
        name: "overall attendance link",
        structural: &[r#"a[href*="StudentOverallAttendance"]"#],
        textual: &[
            TextProbe {
                tags: "a, button, div",
                needle: "overall attendance",
            },
            TextProbe {
                tags: "a",
                needle: "overall attendence",
            },
            TextProbe {
                tags: "a",
                needle: "attendance",
            },
        ],
    };

    pub const MARKS_LINK: LocatorSpec = LocatorSpec {
        name: "marks link",
        structural: &[
            r#"a[href*="marks"]"#,
            r#"a[href*="Marks"]"#,
            r#"a[href*="result"]"#,
            r#"a[href*="grade"]"#,
        ],
        textual: &[
            TextProbe {
                tags: "a, button",
                needle: "marks",
            },
            TextProbe {
                tags: "a",
                needle: "results",
            },
            TextProbe {
                tags: "a",
                needle: "grade",
            },
        ],
    };
}
