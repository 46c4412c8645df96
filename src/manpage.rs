//! Manual page generation for `--generate-manpage TEMPLATE`.
//!
//! The template is a troff document written by hand. Generated text goes
//! right after the `.SH SYNOPSIS` and `.SH OPTIONS` headers, so the template
//! controls everything else (name, description, examples, see-also).

use crate::cli::{CommandSpec, FRAMEWORK_OPTIONS};
use crate::settings::{Setting, Settings};

const SYNOPSIS_MARKER: &str = "\n.SH SYNOPSIS\n";
const OPTIONS_MARKER: &str = "\n.SH OPTIONS\n";

/// Fill `template` with the synopsis and option list for this program.
pub fn fill_template(template: &str, spec: &CommandSpec, settings: &Settings) -> String {
    let options = collect_options(settings);
    let filled = insert_after(template, SYNOPSIS_MARKER, &synopsis(spec, &options));
    insert_after(&filled, OPTIONS_MARKER, &option_list(&options))
}

fn insert_after(text: &str, marker: &str, addition: &str) -> String {
    match text.find(marker) {
        Some(pos) => {
            let split = pos + marker.len();
            format!("{}{addition}{}", &text[..split], &text[split..])
        }
        None => text.to_string(),
    }
}

/// An option as shown in the manual page.
struct ManOption {
    names: Vec<String>,
    metavar: Option<String>,
    help: String,
}

fn collect_options(settings: &Settings) -> Vec<ManOption> {
    let mut options = vec![
        ManOption {
            names: vec!["help".into(), "h".into()],
            metavar: None,
            help: "show a help message and exit".into(),
        },
        ManOption {
            names: vec!["version".into(), "V".into()],
            metavar: None,
            help: "show the program's version number and exit".into(),
        },
    ];
    options.extend(
        settings
            .iter()
            .filter(|s| !s.is_hidden())
            .map(setting_option),
    );
    options.extend(FRAMEWORK_OPTIONS.iter().map(|opt| ManOption {
        names: vec![opt.name.to_string()],
        metavar: opt.metavar.map(str::to_string),
        help: opt.help.to_string(),
    }));
    options
}

fn setting_option(setting: &Setting) -> ManOption {
    ManOption {
        names: setting.names().to_vec(),
        metavar: setting.kind().takes_value().then(|| setting.metavar()),
        help: setting.help().to_string(),
    }
}

/// Escape text for troff: backslashes, dashes and leading control
/// characters.
fn escape(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('-', "\\-");
    if escaped.starts_with('.') || escaped.starts_with('\'') {
        format!("\\&{escaped}")
    } else {
        escaped
    }
}

fn flag(name: &str) -> String {
    if name.chars().count() == 1 {
        format!("\\-{}", escape(name))
    } else {
        format!("\\-\\-{}", escape(name))
    }
}

fn flag_with_value(name: &str, metavar: Option<&str>) -> String {
    match metavar {
        Some(m) if name.chars().count() == 1 => format!("{} \\fI{}\\fR", flag(name), escape(m)),
        Some(m) => format!("{}=\\fI{}\\fR", flag(name), escape(m)),
        None => flag(name),
    }
}

fn synopsis(spec: &CommandSpec, options: &[ManOption]) -> String {
    let mut out = String::from(".nh\n");
    out.push_str(&format!(".B {}\n", escape(&spec.progname)));
    for opt in options {
        for name in &opt.names {
            out.push_str(&format!(
                ".RB [ {} ]\n",
                flag_with_value(name, opt.metavar.as_deref())
            ));
        }
    }
    if spec.subcommands.is_empty() {
        out.push_str(&format!("{}\n", escape(&spec.arg_synopsis)));
    } else {
        for cmd in &spec.subcommands {
            out.push_str(".br\n");
            out.push_str(&format!(".B {}\n", escape(&spec.progname)));
            out.push_str("[options]\n");
            let line = match &cmd.synopsis {
                Some(syn) => format!("{} {syn}", cmd.name),
                None => cmd.name.clone(),
            };
            out.push_str(&format!("{}\n", escape(&line)));
        }
    }
    out.push_str(".hy\n");
    out
}

fn option_list(options: &[ManOption]) -> String {
    let mut out = String::new();
    for opt in options {
        let names: Vec<String> = opt
            .names
            .iter()
            .map(|name| flag_with_value(name, opt.metavar.as_deref()))
            .collect();
        out.push_str(".TP\n");
        out.push_str(&format!(".BR {}\n", names.join(" \", \" ")));
        out.push_str(&format!("{}\n", escape(&opt.help)));
    }
    out
}
