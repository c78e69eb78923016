#[cfg(test)]
mod macro_tests {

    /// awaits an async function, for easier usage in sync tests. Requires the `tokio_test` dependency.
    macro_rules! aw {
        ($e:expr) => {
            tokio_test::block_on($e)
        };
    }

    #[test]
    fn repominer_trace_time_does_not_modify_function_results_in_sync_functions() {
        use repominer_lib::repominer_trace_time;

        #[repominer_trace_time]
        fn traced_function(string: &str) -> usize {
            string.len()
        }

        fn non_traced_function(string: &str) -> usize {
            string.len()
        }

        let dummy_input = "this is a dummy input";
        assert_eq!(traced_function(dummy_input), non_traced_function(dummy_input))
    }

    #[test]
    fn repominer_trace_time_does_not_modify_function_results_in_async_functions() {
        use repominer_lib::repominer_trace_time;

        #[repominer_trace_time]
        async fn traced_function(string: &str) -> usize {
            string.len()
        }

        async fn non_traced_function(string: &str) -> usize {
            string.len()
        }

        let dummy_input = "this is a dummy input";

        assert_eq!(aw!(traced_function(dummy_input)), aw!(non_traced_function(dummy_input)));
    }

    #[test]
    fn repominer_trace_time_keeps_early_returns_and_question_marks_in_async_functions() {
        use repominer_lib::repominer_trace_time;

        #[repominer_trace_time]
        async fn parse_page_size(raw: &str) -> Result<u32, std::num::ParseIntError> {
            if raw.is_empty() {
                return Ok(100);
            }
            let parsed = raw.parse::<u32>()?;
            Ok(parsed.min(100))
        }

        assert_eq!(aw!(parse_page_size("")), Ok(100));
        assert_eq!(aw!(parse_page_size("50")), Ok(50));
        assert_eq!(aw!(parse_page_size("500")), Ok(100));
        assert!(aw!(parse_page_size("fifty")).is_err());
    }

    #[test]
    fn repominer_trace_time_keeps_question_marks_in_sync_functions() {
        use repominer_lib::repominer_trace_time;

        #[repominer_trace_time]
        fn parse_target(raw: &str) -> Result<usize, std::num::ParseIntError> {
            let parsed = raw.trim().parse::<usize>()?;
            Ok(parsed)
        }

        assert_eq!(parse_target(" 201 "), Ok(201));
        assert!(parse_target("two hundred").is_err());
    }
}
