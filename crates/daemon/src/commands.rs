//! Built-in command table.

/// A named action the daemon can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Primary name, matched case-insensitively.
    pub name: &'static str,
    /// Alternative names.
    pub aliases: &'static [&'static str],
    /// One-line description for help output.
    pub description: &'static str,
    /// Program to execute.
    pub program: &'static str,
    /// Arguments always passed to the program.
    pub base_args: &'static [&'static str],
    /// Whether request arguments are appended after `base_args`.
    pub forward_args: bool,
}

impl CommandSpec {
    /// Every name this command answers to, primary name first.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }

    /// Arguments to pass to the program for a request carrying `args`.
    pub fn argv(&self, args: &[String]) -> Vec<String> {
        let mut argv: Vec<String> = self.base_args.iter().map(|a| a.to_string()).collect();
        if self.forward_args {
            argv.extend(args.iter().cloned());
        }
        argv
    }
}

/// The commands registered at startup.
pub fn builtin() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "suspend",
            aliases: &[],
            description: "systemctl suspend",
            program: "systemctl",
            base_args: &["suspend"],
            forward_args: false,
        },
        CommandSpec {
            name: "reboot",
            aliases: &[],
            description: "systemctl reboot",
            program: "systemctl",
            base_args: &["reboot"],
            forward_args: false,
        },
        CommandSpec {
            name: "poweroff",
            aliases: &[],
            description: "systemctl poweroff",
            program: "systemctl",
            base_args: &["poweroff"],
            forward_args: false,
        },
        CommandSpec {
            name: "test",
            aliases: &[],
            description: "Run a developer test (echo)",
            program: "echo",
            base_args: &["dev Test working ;)"],
            forward_args: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let names: Vec<_> = builtin().iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["suspend", "reboot", "poweroff", "test"]);
    }

    #[test]
    fn test_power_commands_use_systemctl() {
        for spec in builtin().iter().filter(|c| c.name != "test") {
            assert_eq!(spec.program, "systemctl");
            assert_eq!(spec.base_args, &[spec.name]);
        }
    }

    #[test]
    fn test_builtins_ignore_request_args() {
        let commands = builtin();
        let reboot = commands.iter().find(|c| c.name == "reboot").unwrap();
        assert_eq!(reboot.argv(&["--force".to_string()]), vec!["reboot"]);

        let test = commands.iter().find(|c| c.name == "test").unwrap();
        assert_eq!(
            test.argv(&["alpha".to_string(), "beta".to_string()]),
            vec!["dev Test working ;)"]
        );
    }

    #[test]
    fn test_forwarding_command_appends_args() {
        let spec = CommandSpec {
            name: "say",
            aliases: &[],
            description: "Echo the request arguments",
            program: "echo",
            base_args: &["-n"],
            forward_args: true,
        };
        assert_eq!(
            spec.argv(&["alpha".to_string(), "beta".to_string()]),
            vec!["-n", "alpha", "beta"]
        );
    }

    #[test]
    fn test_names_include_aliases() {
        let spec = CommandSpec {
            name: "lock",
            aliases: &["screenlock"],
            description: "Lock the session",
            program: "loginctl",
            base_args: &["lock-session"],
            forward_args: false,
        };
        assert_eq!(spec.names().collect::<Vec<_>>(), vec!["lock", "screenlock"]);
    }
}
