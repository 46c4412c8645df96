#[cfg(test)]
pub mod test {
    use std::cell::RefCell;
    use std::io::{self, BufRead, Write};
    use std::rc::Rc;

    use crate::app::{Application, Context};
    use crate::error::AppError;
    use crate::settings::Settings;

    /// Framework settings plus a small grep-like set of application ones.
    pub fn sample_settings() -> Settings {
        let mut settings = Settings::with_defaults().unwrap();
        settings
            .add_string(&["pattern", "p"], "search for PATTERN", "h")
            .unwrap();
        settings
            .add_integer(&["count"], "stop after N matches", 0)
            .unwrap()
            .set_metavar("N");
        settings
            .add_boolean(&["ignore-case"], "ignore case when matching", false)
            .unwrap();
        settings
            .add_string_list(&["exclude"], "skip lines containing WORD", &[])
            .unwrap()
            .set_metavar("WORD");
        settings
    }

    #[test]
    fn sample_settings_defaults() {
        let settings = sample_settings();
        assert_eq!(settings.string("pattern").unwrap(), "h");
        assert_eq!(settings.integer("count").unwrap(), 0);
        assert!(!settings.boolean("ignore-case").unwrap());
        assert!(settings.string_list("exclude").unwrap().is_empty());
    }

    // -- Application fixture ----------------------------------------------------

    /// Records every line and subcommand call it sees.
    #[derive(Debug, Default)]
    pub struct Recorder {
        pub lines: Vec<(String, String, usize)>,
        pub commands: Vec<Vec<String>>,
    }

    impl Recorder {
        pub fn cmd_record(&mut self, _ctx: &mut Context, args: &[String]) -> Result<(), AppError> {
            self.commands.push(args.to_vec());
            Ok(())
        }
    }

    impl Application for Recorder {
        fn process_input_line(
            &mut self,
            _ctx: &mut Context,
            source: &str,
            line: &str,
            lineno: usize,
        ) -> Result<(), AppError> {
            self.lines
                .push((source.to_string(), line.to_string(), lineno));
            Ok(())
        }
    }

    pub fn test_context() -> Context {
        test_context_with(Box::new(io::sink()), Box::new(io::empty()))
    }

    pub fn test_context_with(output: Box<dyn Write>, stdin: Box<dyn BufRead>) -> Context {
        Context::new(sample_settings(), output, stdin, "grepper", "1.0")
    }

    // -- Output capture -----------------------------------------------------------

    /// A writer whose contents stay readable after it has been moved away.
    #[derive(Debug, Clone, Default)]
    pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
