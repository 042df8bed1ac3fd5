// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-chip frequency → core voltage curves
//!
//! Anchor tables are conservative community-tested values. Lookups linearly
//! interpolate between anchors, add the rail's safety margin and clamp to the
//! rail's voltage window.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::classifier::RailLimits;

/// ASIC model driving a device's hashing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChipFamily {
    BM1397,
    BM1366,
    BM1368,
    BM1370,
}

impl ChipFamily {
    pub const ALL: [ChipFamily; 4] = [
        ChipFamily::BM1397,
        ChipFamily::BM1366,
        ChipFamily::BM1368,
        ChipFamily::BM1370,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChipFamily::BM1397 => "BM1397",
            ChipFamily::BM1366 => "BM1366",
            ChipFamily::BM1368 => "BM1368",
            ChipFamily::BM1370 => "BM1370",
        }
    }

    /// Model number fragment as it appears in firmware identifiers
    pub(crate) fn model_number(&self) -> &'static str {
        &self.as_str()[2..]
    }

    pub fn curve(&self) -> VoltageCurve {
        match self {
            ChipFamily::BM1397 => VoltageCurve::new(BM1397_CURVE),
            ChipFamily::BM1366 => VoltageCurve::new(BM1366_CURVE),
            ChipFamily::BM1368 => VoltageCurve::new(BM1368_CURVE),
            ChipFamily::BM1370 => VoltageCurve::new(BM1370_CURVE),
        }
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// NerdMiner and early Bitaxe Ultra (5V)
#[rustfmt::skip]
const BM1397_CURVE: &[(f64, f64)] = &[
    (400.0, 1120.0), (450.0, 1150.0), (500.0, 1160.0), (525.0, 1170.0),
    (550.0, 1180.0), (575.0, 1200.0), (600.0, 1220.0), (625.0, 1250.0),
    (650.0, 1275.0), (675.0, 1300.0), (700.0, 1325.0), (725.0, 1350.0),
    (750.0, 1375.0), (775.0, 1400.0), (800.0, 1425.0), (825.0, 1450.0),
    (850.0, 1475.0), (875.0, 1500.0), (900.0, 1525.0), (925.0, 1550.0),
    (950.0, 1575.0), (975.0, 1600.0), (1000.0, 1625.0),
];

// Bitaxe Supra
#[rustfmt::skip]
const BM1366_CURVE: &[(f64, f64)] = &[
    (350.0, 1120.0), (400.0, 1150.0), (450.0, 1160.0), (500.0, 1180.0),
    (550.0, 1200.0), (600.0, 1230.0), (650.0, 1260.0), (700.0, 1300.0),
    (750.0, 1340.0), (800.0, 1380.0), (850.0, 1420.0), (900.0, 1460.0),
    (950.0, 1500.0), (1000.0, 1540.0), (1050.0, 1580.0), (1100.0, 1620.0),
    (1150.0, 1660.0), (1200.0, 1700.0),
];

// Bitaxe Hex
#[rustfmt::skip]
const BM1368_CURVE: &[(f64, f64)] = &[
    (350.0, 1120.0), (400.0, 1150.0), (450.0, 1160.0), (500.0, 1170.0),
    (600.0, 1200.0), (700.0, 1240.0), (800.0, 1280.0), (900.0, 1330.0),
    (1000.0, 1380.0), (1100.0, 1430.0), (1200.0, 1480.0), (1300.0, 1530.0),
    (1400.0, 1580.0), (1500.0, 1630.0), (1600.0, 1680.0),
];

// Bitaxe Gamma; vendor table in 6.25 MHz steps
#[rustfmt::skip]
const BM1370_CURVE: &[(f64, f64)] = &[
    (400.0, 941.0), (406.25, 944.0), (412.5, 947.0), (418.75, 950.0),
    (425.0, 953.0), (431.25, 955.0), (437.5, 958.0), (443.75, 961.0),
    (450.0, 964.0), (456.25, 967.0), (462.5, 969.0), (468.75, 972.0),
    (475.0, 975.0), (481.25, 978.0), (487.5, 981.0), (493.75, 983.0),
    (500.0, 986.0), (506.25, 989.0), (512.5, 992.0), (518.75, 995.0),
    (525.0, 998.0), (531.25, 1000.0), (537.5, 1003.0), (543.75, 1006.0),
    (550.0, 1009.0), (556.25, 1012.0), (562.5, 1014.0), (568.75, 1017.0),
    (575.0, 1020.0), (581.25, 1023.0), (587.5, 1026.0), (593.75, 1028.0),
    (600.0, 1031.0), (606.25, 1034.0), (612.5, 1037.0), (618.75, 1040.0),
    (625.0, 1043.0), (631.25, 1045.0), (637.5, 1048.0), (643.75, 1051.0),
    (650.0, 1054.0), (656.25, 1057.0), (662.5, 1059.0), (668.75, 1062.0),
    (675.0, 1065.0), (681.25, 1068.0), (687.5, 1071.0), (693.75, 1073.0),
    (700.0, 1076.0), (706.25, 1079.0), (712.5, 1082.0), (718.75, 1085.0),
    (725.0, 1088.0), (731.25, 1090.0), (737.5, 1093.0), (743.75, 1096.0),
    (750.0, 1099.0), (756.25, 1102.0), (762.5, 1104.0), (768.75, 1107.0),
    (775.0, 1110.0), (781.25, 1113.0), (787.5, 1116.0), (793.75, 1118.0),
    (800.0, 1121.0), (806.25, 1124.0), (812.5, 1127.0), (818.75, 1130.0),
    (825.0, 1133.0), (831.25, 1135.0), (837.5, 1138.0), (843.75, 1141.0),
    (850.0, 1144.0), (856.25, 1147.0), (862.5, 1149.0), (868.75, 1152.0),
    (875.0, 1155.0), (881.25, 1158.0), (887.5, 1161.0), (893.75, 1163.0),
    (900.0, 1166.0), (906.25, 1169.0), (912.5, 1172.0), (918.75, 1175.0),
    (925.0, 1178.0), (931.25, 1180.0), (937.5, 1183.0), (943.75, 1186.0),
    (950.0, 1189.0), (956.25, 1192.0), (962.5, 1194.0), (968.75, 1197.0),
    (975.0, 1200.0), (981.25, 1203.0), (987.5, 1206.0), (993.75, 1208.0),
    (1000.0, 1211.0), (1006.25, 1214.0), (1012.5, 1217.0), (1018.75, 1220.0),
    (1025.0, 1223.0), (1031.25, 1225.0), (1037.5, 1228.0), (1043.75, 1231.0),
    (1050.0, 1234.0), (1056.25, 1237.0), (1062.5, 1239.0), (1068.75, 1242.0),
    (1075.0, 1245.0), (1081.25, 1248.0), (1087.5, 1251.0), (1093.75, 1253.0),
    (1100.0, 1256.0), (1106.25, 1259.0), (1112.5, 1262.0), (1118.75, 1265.0),
    (1125.0, 1268.0), (1131.25, 1270.0), (1137.5, 1273.0), (1143.75, 1276.0),
    (1150.0, 1279.0), (1156.25, 1282.0), (1162.5, 1284.0), (1168.75, 1287.0),
    (1175.0, 1290.0), (1181.25, 1293.0), (1187.5, 1296.0), (1193.75, 1298.0),
    (1200.0, 1301.0),
];

/// Ordered `(frequency MHz, voltage mV)` anchors, non-decreasing in both axes
#[derive(Debug, Clone, Copy)]
pub struct VoltageCurve {
    anchors: &'static [(f64, f64)],
}

impl VoltageCurve {
    pub const fn new(anchors: &'static [(f64, f64)]) -> Self {
        Self { anchors }
    }

    pub fn anchors(&self) -> &'static [(f64, f64)] {
        self.anchors
    }

    /// Raw curve voltage at `frequency`, before rail margin and clamping
    pub fn interpolate(&self, frequency: f64) -> Option<f64> {
        let (first, last) = (self.anchors.first()?, self.anchors.last()?);
        if frequency <= first.0 {
            return Some(first.1);
        }
        if frequency >= last.0 {
            return Some(last.1);
        }

        self.anchors.windows(2).find_map(|pair| {
            let ((f1, v1), (f2, v2)) = (pair[0], pair[1]);
            if frequency > f2 {
                return None;
            }
            let ratio = (frequency - f1) / (f2 - f1);
            Some((v1 + (v2 - v1) * ratio).round())
        })
    }
}

/// Recommended core voltage for `frequency` on `chip`, within the rail window.
///
/// Returns `None` when the chip family is unknown; callers fall back to
/// step-based adjustment.
pub fn recommend(frequency: f64, chip: Option<ChipFamily>, rail: &RailLimits) -> Option<f64> {
    let raw = chip?.curve().interpolate(frequency)?;
    Some((raw + rail.safety_margin_mv).clamp(rail.min_voltage, rail.max_voltage))
}
