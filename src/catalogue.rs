//! The list of tools to keep up to date.

use crate::models::{BLEEPING_COMPUTER_CHAIN, Descriptor};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Category aliases and the directory each one files into.
pub const CATEGORIES: [(&str, &str); 12] = [
    ("safe_mode", "0_safe_mode"),
    ("kill", "1_kill"),
    ("fast", "2_fast"),
    ("slow", "3_slow"),
    ("extra", "4_extra"),
    ("rootkit", "2_rootkit"),
    ("diagnosis", "4_extra"),
    ("tools", "tools"),
    ("fix", "5_fix"),
    ("tuneup", "5_fix"),
    ("mac", "mac"),
    ("licences_and_passwords", "licences_and_passwords"),
];

/// Map an alias to its directory name; anything else is taken as a
/// directory name already.
pub fn category_dir(name: &str) -> &str {
    CATEGORIES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, dir)| *dir)
        .unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    BleepingComputer,
}

/// One entry of a JSON catalogue file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogueEntry {
    pub url: String,
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub filetype: Option<String>,
    #[serde(default)]
    pub preset: Option<Preset>,
}

impl From<CatalogueEntry> for Descriptor {
    fn from(entry: CatalogueEntry) -> Self {
        let mut selectors = entry.selectors;
        let mut file_type = entry.filetype;
        if entry.preset == Some(Preset::BleepingComputer) {
            selectors = BLEEPING_COMPUTER_CHAIN.iter().map(|s| s.to_string()).collect();
            file_type.get_or_insert_with(|| ".exe".to_string());
        }

        Descriptor {
            start_url: entry.url,
            selectors,
            name_prefix: entry.prefix,
            category: entry.category.map(|c| category_dir(&c).to_string()),
            file_type,
        }
    }
}

pub fn load(path: &Path) -> Result<Vec<Descriptor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalogue {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse catalogue {}", path.display()))
}

pub fn parse(content: &str) -> Result<Vec<Descriptor>> {
    let entries: Vec<CatalogueEntry> = serde_json::from_str(content)?;
    Ok(entries.into_iter().map(Descriptor::from).collect())
}

/// The catalogue shipped with the binary.
pub fn builtin() -> Vec<Descriptor> {
    let cat = category_dir;
    let bleeping = |tool: &str, prefix: &str, category: &str| {
        Descriptor::bleeping_computer(
            &format!("http://www.bleepingcomputer.com/download/{tool}/"),
            prefix,
            cat(category),
        )
    };

    vec![
        // Emsisoft & Kaspersky
        Descriptor::direct("http://dl.emsisoft.com/EmsisoftEmergencyKit.exe", "", cat("slow")),
        Descriptor::direct(
            "http://devbuilds.kaspersky-labs.com/devbuilds/KVRT/latest/full/KVRT.exe",
            "Kaspersky_VirusRemovalTool",
            cat("fast"),
        ),
        Descriptor::direct(
            "http://media.kaspersky.com/utilities/VirusUtilities/RU/cleanautorun.exe",
            "Kaspersky",
            cat("fix"),
        ),
        Descriptor::direct(
            "http://media.kaspersky.com/utilities/VirusUtilities/EN/tdsskiller.exe",
            "Kaspersky",
            cat("rootkit"),
        ),
        // Malwarebytes
        Descriptor::direct(
            "https://downloads.malwarebytes.org/file/mbam_current/",
            "Malwarebytes",
            cat("slow"),
        ),
        Descriptor::direct(
            "https://downloads.malwarebytes.org/file/mbar/",
            "Malwarebytes_AntiRootkit_Beta",
            cat("rootkit"),
        ),
        Descriptor::direct(
            "https://downloads.malwarebytes.org/file/chameleon/",
            "Malwarebytes",
            cat("slow"),
        ),
        Descriptor::direct(
            "https://downloads.malwarebytes.org/file/startuplite",
            "Malwarebytes",
            cat("tuneup"),
        ),
        // TrendMicro
        Descriptor::crawl(
            "http://housecall.trendmicro.com/",
            &["#download-form a.button"],
            "TrendMicro",
            cat("extra"),
        ),
        Descriptor::crawl(
            "http://free.antivirus.com/us/rootkit-buster/index.html",
            &[".cta-primary", "tr .file_link"],
            "TrendMicro",
            cat("rootkit"),
        ),
        Descriptor::crawl(
            "http://free.antivirus.com/us/rubotted/",
            &[".cta-primary", "tr .file_link"],
            "TrendMicro",
            cat("rootkit"),
        ),
        // Others
        Descriptor::crawl(
            "http://www.surfright.nl/en/products/",
            &[r#"a[href^="http://dl.surfright.nl/HitmanPro"]"#],
            "",
            cat("extra"),
        ),
        Descriptor::direct(
            "https://zemana.com/Download/AntiMalware/Portable/Zemana.AntiMalware.Portable.exe?new_affid=189",
            "",
            cat("fast"),
        ),
        Descriptor::direct(
            "http://kb.eset.com/library/ESET/KB%20Team%20Only/Malware/ServicesRepair.exe",
            "ESET",
            cat("fix"),
        ),
        Descriptor::crawl(
            "http://www.bitdefender.com/solutions/adware-removal-tool-for-pc.html",
            &[".free-download"],
            "BitDefender-AdWare-Remover",
            cat("fast"),
        ),
        Descriptor::direct(
            "http://www.superantispyware.com/sasportablehome.php",
            "SuperAntiSpyware_Portable",
            cat("extra"),
        )
        .with_file_type(".exe"),
        // BleepingComputer mirrors
        bleeping("adwcleaner", "", "fast"),
        bleeping("rkill", "", "kill"),
        bleeping("hijackthis", "", "diagnosis"),
        bleeping("mcafee-labs-rootkit-remover", "McAfee-Labs", "rootkit"),
        bleeping("panda-anti-rootkit", "Panda", "rootkit"),
        bleeping("sophos-virus-removal-tool", "", "fast"),
        bleeping("rootkitrevealer", "Microsoft", "rootkit"),
        bleeping("autoruns", "", "tools"),
        bleeping("process-explorer", "", "tools"),
        bleeping("aswmbr", "Avast", "rootkit"),
        bleeping("emsisoft-antimalware", "", "slow"),
        bleeping("roguekiller", "", "extra"),
        // Repair and password tools
        Descriptor::crawl(
            "http://www.tweaking.com/content/page/windows_repair_all_in_one.html",
            &[r#"a[href^="http://www.tweaking.com/files/setup"][href$=".zip"]"#],
            "",
            cat("fix"),
        ),
        Descriptor::crawl(
            "http://support.eset.de/kb3527/",
            &[r#"a[href^="http://download.eset.com"]"#],
            "ESET",
            cat("tools"),
        ),
        Descriptor::direct(
            "http://download.keit.co/current/recall.zip",
            "keit.co",
            cat("licences_and_passwords"),
        ),
        Descriptor::crawl(
            "http://launcher.nirsoft.net/download.html",
            &[r#"a[href^="http://download.nirsoft.net/nirsoft_package_1"]"#],
            "",
            cat("tools"),
        ),
    ]
}
