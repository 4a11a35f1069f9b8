use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use ethers::{abi::Abi, types::Bytes};
use serde::Deserialize;

const SKIPPED_DIRS: [&str; 2] = ["build-info", "cache"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    abi: Abi,
    bytecode: Bytes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_version: String,
}

/// Compiled contract as produced by `hardhat compile`.
#[derive(Clone, Debug)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
    pub path: PathBuf,
    pub solc_version: Option<String>,
}

impl ContractArtifact {
    /// Loads `name` from `artifacts_dir`. Accepts a bare contract name or a
    /// fully qualified `contracts/Foo.sol:Foo`.
    pub fn load(artifacts_dir: &Path, name: &str) -> Result<Self> {
        let path = Self::locate(artifacts_dir, name)?;
        log::debug!("artifact for {} at {}", name, path.display());
        Self::from_file(&path)
    }

    fn locate(artifacts_dir: &Path, name: &str) -> Result<PathBuf> {
        if let Some((source, contract)) = name.rsplit_once(':') {
            let path = artifacts_dir.join(source).join(format!("{}.json", contract));
            if !path.is_file() {
                bail!("artifact for {} not found at {}", name, path.display());
            }
            return Ok(path);
        }

        let file_name = format!("{}.json", name);
        let mut found = Vec::new();
        find_files(artifacts_dir, &file_name, &mut found)
            .with_context(|| format!("failed to scan {}", artifacts_dir.display()))?;

        match found.len() {
            0 => Err(anyhow!(
                "artifact for {} not found in {}, run `hardhat compile` first",
                name,
                artifacts_dir.display()
            )),
            1 => Ok(found.remove(0)),
            _ => {
                found.sort();
                Err(anyhow!(
                    "multiple artifacts named {}, use a fully qualified name: {}",
                    name,
                    found
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;
        let artifact: HardhatArtifact = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse artifact {}", path.display()))?;

        if artifact.bytecode.is_empty() {
            bail!(
                "{} has no bytecode, abstract contracts and interfaces cannot be deployed",
                artifact.contract_name
            );
        }

        Ok(Self {
            solc_version: read_solc_version(path)?,
            contract_name: artifact.contract_name,
            source_name: artifact.source_name,
            abi: artifact.abi,
            bytecode: artifact.bytecode,
            path: path.to_path_buf(),
        })
    }

    /// `contracts/Foo.sol:Foo`, unambiguous even when names collide.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// Fails when the artifact was built by a compiler other than `pinned`.
    pub fn check_compiler(&self, pinned: &str) -> Result<()> {
        match &self.solc_version {
            Some(version) if version_matches(version, pinned) => Ok(()),
            Some(version) => Err(anyhow!(
                "{} was compiled with solc {}, expected {}",
                self.contract_name,
                version,
                pinned
            )),
            None => {
                log::warn!(
                    "no build info next to {}, skipping compiler version check",
                    self.path.display()
                );
                Ok(())
            }
        }
    }
}

fn version_matches(version: &str, pinned: &str) -> bool {
    version == pinned
        || version
            .strip_prefix(pinned)
            .map_or(false, |rest| rest.starts_with('+'))
}

fn find_files(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            let skipped = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| SKIPPED_DIRS.contains(&n));
            if !skipped {
                find_files(&path, file_name, found)?;
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
            found.push(path);
        }
    }
    Ok(())
}

// Foo.json sits next to Foo.dbg.json, which points at the build-info file
// holding the compiler version.
fn read_solc_version(artifact_path: &Path) -> Result<Option<String>> {
    let stem = match artifact_path.file_stem().and_then(|s| s.to_str()) {
        Some(stem) => stem,
        None => return Ok(None),
    };
    let debug_path = artifact_path.with_file_name(format!("{}.dbg.json", stem));
    if !debug_path.is_file() {
        return Ok(None);
    }

    let debug: DebugFile = serde_json::from_str(&fs::read_to_string(&debug_path)?)
        .with_context(|| format!("failed to parse {}", debug_path.display()))?;
    let build_info_path = debug_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&debug.build_info);
    if !build_info_path.is_file() {
        return Ok(None);
    }

    let build_info: BuildInfo = serde_json::from_str(&fs::read_to_string(&build_info_path)?)
        .with_context(|| format!("failed to parse {}", build_info_path.display()))?;
    Ok(Some(build_info.solc_version))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const RAFFLE_ABI: &str = r#"[
        {
            "inputs": [{ "internalType": "address", "name": "vrfConsumer", "type": "address" }],
            "stateMutability": "nonpayable",
            "type": "constructor"
        }
    ]"#;

    pub(crate) fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "raffle-deploy-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Lays out `artifacts/contracts/<source>/<name>.json` plus its debug and
    /// build-info files the way hardhat does.
    pub(crate) fn write_artifact(
        artifacts: &Path,
        source: &str,
        name: &str,
        bytecode: &str,
        solc_version: Option<&str>,
    ) {
        let dir = artifacts.join("contracts").join(source);
        fs::create_dir_all(&dir).unwrap();
        let artifact = format!(
            r#"{{
                "_format": "hh-sol-artifact-1",
                "contractName": "{name}",
                "sourceName": "contracts/{source}",
                "abi": {RAFFLE_ABI},
                "bytecode": "{bytecode}",
                "deployedBytecode": "{bytecode}",
                "linkReferences": {{}},
                "deployedLinkReferences": {{}}
            }}"#
        );
        fs::write(dir.join(format!("{name}.json")), artifact).unwrap();

        if let Some(version) = solc_version {
            let build_info = artifacts.join("build-info");
            fs::create_dir_all(&build_info).unwrap();
            let id = format!("{}-{}", name, version.replace('.', "_"));
            fs::write(
                build_info.join(format!("{id}.json")),
                format!(r#"{{ "_format": "hh-sol-build-info-1", "id": "{id}", "solcVersion": "{version}" }}"#),
            )
            .unwrap();
            fs::write(
                dir.join(format!("{name}.dbg.json")),
                format!(r#"{{ "_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/{id}.json" }}"#),
            )
            .unwrap();
        }
    }

    #[test]
    fn load_by_bare_name() {
        let artifacts = scratch_dir("bare-name");
        write_artifact(&artifacts, "MetawinRaffle.sol", "MetawinRaffle", "0x6080", Some("0.8.4"));

        let artifact = ContractArtifact::load(&artifacts, "MetawinRaffle").unwrap();

        assert_eq!(artifact.contract_name, "MetawinRaffle");
        assert_eq!(
            artifact.qualified_name(),
            "contracts/MetawinRaffle.sol:MetawinRaffle"
        );
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80]);
        assert!(artifact.abi.constructor().is_some());
        assert_eq!(artifact.solc_version.as_deref(), Some("0.8.4"));
        artifact.check_compiler("0.8.4").unwrap();
    }

    #[test]
    fn load_by_qualified_name() {
        let artifacts = scratch_dir("qualified-name");
        write_artifact(&artifacts, "Raffle.sol", "MetawinRaffle", "0x6080", None);
        write_artifact(&artifacts, "Legacy.sol", "MetawinRaffle", "0x6081", None);

        let err = ContractArtifact::load(&artifacts, "MetawinRaffle").unwrap_err();
        assert!(err.to_string().contains("multiple artifacts"));

        let artifact =
            ContractArtifact::load(&artifacts, "contracts/Legacy.sol:MetawinRaffle").unwrap();
        assert_eq!(artifact.qualified_name(), "contracts/Legacy.sol:MetawinRaffle");
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x81]);
    }

    #[test]
    fn missing_artifact() {
        let artifacts = scratch_dir("missing");
        write_artifact(&artifacts, "MetawinRaffle.sol", "MetawinRaffle", "0x6080", None);

        let err = ContractArtifact::load(&artifacts, "VRFv2Consumer").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn interface_has_nothing_to_deploy() {
        let artifacts = scratch_dir("interface");
        write_artifact(&artifacts, "IRaffle.sol", "IRaffle", "0x", None);

        let err = ContractArtifact::load(&artifacts, "IRaffle").unwrap_err();
        assert!(err.to_string().contains("no bytecode"));
    }

    #[test]
    fn compiler_pin() {
        let artifacts = scratch_dir("compiler-pin");
        write_artifact(&artifacts, "MetawinRaffle.sol", "MetawinRaffle", "0x6080", Some("0.8.19"));
        let artifact = ContractArtifact::load(&artifacts, "MetawinRaffle").unwrap();

        let err = artifact.check_compiler("0.8.4").unwrap_err();
        assert!(err.to_string().contains("0.8.19"));
        artifact.check_compiler("0.8.19").unwrap();
    }

    #[test]
    fn compiler_pin_without_build_info() {
        let artifacts = scratch_dir("no-build-info");
        write_artifact(&artifacts, "MetawinRaffle.sol", "MetawinRaffle", "0x6080", None);
        let artifact = ContractArtifact::load(&artifacts, "MetawinRaffle").unwrap();

        assert!(artifact.solc_version.is_none());
        artifact.check_compiler("0.8.4").unwrap();
    }

    #[test]
    fn version_matching() {
        assert!(version_matches("0.8.4", "0.8.4"));
        assert!(version_matches("0.8.4+commit.c7e474f2", "0.8.4"));
        assert!(!version_matches("0.8.40", "0.8.4"));
        assert!(!version_matches("0.8.3", "0.8.4"));
    }
}
