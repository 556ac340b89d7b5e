//! Filter compilation across metadata storage modes

use super::common::*;
use anyhow::Result;
use proximadb_pgvector::storage::connection::SqlValue;
use proximadb_pgvector::storage::MetadataStorageFactory;
use proximadb_pgvector::{
    FilterCompiler, MetadataColumn, MetadataFilter, MetadataStorageConfig, MetadataValue,
};

#[cfg(test)]
mod filter_compilation_tests {
    use super::*;

    fn all_modes() -> Result<Vec<MetadataStorageConfig>> {
        Ok(vec![
            MetadataStorageConfig::column_per_key(vec![
                MetadataColumn::text("genre"),
                MetadataColumn::integer("year"),
            ])
            .build()?,
            MetadataStorageConfig::combined_json().build()?,
            MetadataStorageConfig::combined_jsonb().index("genre").build()?,
        ])
    }

    #[test]
    fn test_in_parameter_count_matches_list_length() -> Result<()> {
        init_test_env();
        for config in all_modes()? {
            let storage = MetadataStorageFactory::create(&config)?;
            let compiler = FilterCompiler::new(storage.as_ref());
            for list in [vec!["x", "y", "z"], vec!["z", "x", "y"], vec!["y"]] {
                let result = compiler.compile(Some(&MetadataFilter::is_in("genre", list.clone())))?;
                assert_eq!(result.params().len(), list.len(), "mode {}", config.mode);
                assert_eq!(result.clause().matches('$').count(), list.len());
                let bound: Vec<SqlValue> = list.iter().map(|s| SqlValue::from(*s)).collect();
                assert_eq!(result.params(), bound.as_slice());
            }
        }
        Ok(())
    }

    #[test]
    fn test_injection_payloads_stay_parameters() -> Result<()> {
        init_test_env();
        let payloads = [
            "'; DROP TABLE x; --",
            "' OR '1'='1",
            "\\'; SELECT pg_sleep(10); --",
            "comedy') OR TRUE --",
        ];

        for config in all_modes()? {
            let storage = MetadataStorageFactory::create(&config)?;
            let compiler = FilterCompiler::new(storage.as_ref());
            for payload in payloads {
                let filter = MetadataFilter::eq("genre", payload)
                    .or(MetadataFilter::not_in("genre", [payload, "x"]))
                    .negate();
                let result = compiler.compile(Some(&filter))?;
                assert!(!result.clause().contains(payload), "mode {}", config.mode);
                assert_eq!(result.params().len(), 3);
                assert!(result
                    .params()
                    .iter()
                    .any(|p| *p == SqlValue::Text(payload.to_string())));
            }
        }
        Ok(())
    }

    #[test]
    fn test_key_validation_is_mode_independent() -> Result<()> {
        init_test_env();
        for config in all_modes()? {
            let storage = MetadataStorageFactory::create(&config)?;
            let compiler = FilterCompiler::new(storage.as_ref());
            let err = compiler
                .compile(Some(&MetadataFilter::eq("genre'--", "x")))
                .unwrap_err();
            assert!(err.is_validation(), "mode {}", config.mode);
        }
        Ok(())
    }

    #[test]
    fn test_numeric_rendering_differs_by_mode() -> Result<()> {
        init_test_env();
        let modes = all_modes()?;
        let filter = MetadataFilter::lt("year", MetadataValue::Integer(2000));

        let columns = MetadataStorageFactory::create(&modes[0])?;
        let result = FilterCompiler::new(columns.as_ref()).compile(Some(&filter))?;
        assert_eq!(result.clause(), "year < $1");

        let json = MetadataStorageFactory::create(&modes[1])?;
        let result = FilterCompiler::new(json.as_ref()).compile(Some(&filter))?;
        assert_eq!(result.clause(), "(metadata->>'year')::numeric < $1");
        assert_eq!(result.params(), &[SqlValue::BigInt(2000)]);
        Ok(())
    }
}
