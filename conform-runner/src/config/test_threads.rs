// Copyright (c) The conform Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::TestThreadsParseError;
use serde::Deserialize;
use std::{cmp::Ordering, fmt, str::FromStr, sync::LazyLock};
use tracing::warn;

/// Returns the number of logical CPUs, or 1 if that can't be determined.
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Type for the test-threads config key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestThreads {
    /// Run tests with a specified number of threads.
    Count(usize),

    /// Run tests with a number of threads equal to the logical CPU count.
    NumCpus,
}

impl TestThreads {
    /// Gets the actual number of test threads computed at runtime.
    pub fn compute(self) -> usize {
        match self {
            Self::Count(threads) => threads,
            Self::NumCpus => get_num_cpus(),
        }
    }
}

impl FromStr for TestThreads {
    type Err = TestThreadsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "num-cpus" {
            return Ok(Self::NumCpus);
        }

        match s.parse::<isize>() {
            Err(_) => Err(TestThreadsParseError::new(s)),
            Ok(0) => Err(TestThreadsParseError::new("0 (jobs may not be 0)")),
            Ok(j) if j < 0 => Ok(TestThreads::Count(
                (get_num_cpus() as isize + j).max(1) as usize
            )),
            Ok(j) => Ok(TestThreads::Count(j as usize)),
        }
    }
}

impl fmt::Display for TestThreads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(threads) => write!(f, "{threads}"),
            Self::NumCpus => write!(f, "num-cpus"),
        }
    }
}

impl<'de> Deserialize<'de> for TestThreads {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = TestThreads;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "an integer or the string \"num-cpus\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v == "num-cpus" {
                    Ok(TestThreads::NumCpus)
                } else {
                    Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(v),
                        &self,
                    ))
                }
            }

            // TOML integers are i64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v.cmp(&0) {
                    Ordering::Greater => Ok(TestThreads::Count(v as usize)),
                    Ordering::Less => Ok(TestThreads::Count(
                        (get_num_cpus() as i64 + v).max(1) as usize
                    )),
                    Ordering::Equal => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    )),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConformConfig;
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use test_case::test_case;

    #[test_case("num-cpus", Some(TestThreads::NumCpus); "num cpus")]
    #[test_case("4", Some(TestThreads::Count(4)); "positive")]
    #[test_case("0", None; "zero")]
    #[test_case("many", None; "garbage")]
    fn parse_from_str(input: &str, expected: Option<TestThreads>) {
        assert_eq!(input.parse::<TestThreads>().ok(), expected);
    }

    #[test]
    fn negative_is_relative_to_num_cpus() {
        let threads: TestThreads = "-1".parse().unwrap();
        assert_eq!(threads.compute(), get_num_cpus().saturating_sub(1).max(1));
    }

    #[test_case(
        indoc! {r#"
            test-threads = -1
        "#},
        Some(get_num_cpus().saturating_sub(1).max(1))

        ; "negative"
    )]
    #[test_case(
        indoc! {r#"
            test-threads = 2
        "#},
        Some(2)

        ; "positive"
    )]
    #[test_case(
        indoc! {r#"
            test-threads = 0
        "#},
        None

        ; "zero"
    )]
    #[test_case(
        indoc! {r#"
            test-threads = "num-cpus"
        "#},
        Some(get_num_cpus())

        ; "num-cpus"
    )]
    fn read_from_config(config_contents: &str, expected: Option<usize>) {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("conform.toml");
        std::fs::write(&config_path, config_contents).unwrap();

        let config = ConformConfig::from_sources(dir.path(), Some(&config_path));
        match expected {
            None => assert!(config.is_err(), "zero threads is rejected"),
            Some(expected) => assert_eq!(config.unwrap().test_threads().compute(), expected),
        }
    }
}
