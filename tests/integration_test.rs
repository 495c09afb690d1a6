//! End-to-end tests for the Muskingum parameter pipeline and namelist
//! generation, driven through temporary files the way a RAPID preprocessing
//! run would produce them.

use rapid_prep::compare::compare_csv_decimal_files;
use rapid_prep::connectivity::Connectivity;
use rapid_prep::drainage::DrainageLine;
use rapid_prep::muskingum::{
    write_const_x_file, write_k_file, write_kfac_file, KfacFormula,
};
use rapid_prep::namelist::ParamValue;
use rapid_prep::rapid::RapidManager;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;

fn write_file(path: &Path, contents: &str) {
    let mut f = fs::File::create(path).expect("Failed to create file");
    f.write_all(contents.as_bytes()).expect("Failed to write");
}

#[test]
fn test_kfac_k_x_pipeline() {
    let dir = tempdir().expect("Failed to create temp dir");
    let connect_path = dir.path().join("rapid_connect.csv");
    let kfac_path = dir.path().join("kfac.csv");
    let k_path = dir.path().join("k.csv");
    let x_path = dir.path().join("x.csv");

    // Three reaches: 30 drains through 20 into 10
    write_file(&connect_path, "10,0,1,20\n20,10,1,30\n30,20,0,0\n");

    let drainage = DrainageLine::from_parts(
        vec![10, 20, 30],
        vec![3.0, 2.0, 1.0],
        vec![0.01, 0.02, 0.04],
    );
    let connectivity = Connectivity::from_csv(&connect_path).expect("parse failed");

    let celerity = 1000.0 / 3600.0;
    let summary = write_kfac_file(
        &drainage,
        &connectivity,
        celerity,
        KfacFormula::LengthCelerity,
        &kfac_path,
    )
    .expect("kfac failed");
    assert_eq!(summary.reach_count, 3);

    let kfac_values: Vec<f64> = fs::read_to_string(&kfac_path)
        .expect("read failed")
        .lines()
        .map(|l| l.parse().expect("not a number"))
        .collect();
    assert_eq!(kfac_values.len(), 3);
    // Connectivity order, not drainage-line order
    assert!((kfac_values[0] - 3000.0 / celerity).abs() < 1e-6);
    assert!((kfac_values[2] - 1000.0 / celerity).abs() < 1e-6);

    // K = lambda * Kfac
    let count = write_k_file(0.35, &kfac_path, &k_path).expect("k failed");
    assert_eq!(count, 3);
    let k_values: Vec<f64> = fs::read_to_string(&k_path)
        .expect("read failed")
        .lines()
        .map(|l| l.parse().expect("not a number"))
        .collect();
    for (k, kfac) in k_values.iter().zip(kfac_values.iter()) {
        assert!((k - 0.35 * kfac).abs() < 1e-9);
    }

    // Constant X, one row per reach
    write_const_x_file(0.3, &connect_path, &x_path).expect("x failed");
    assert_eq!(
        fs::read_to_string(&x_path).expect("read failed"),
        "0.3\n0.3\n0.3\n"
    );
}

#[test]
fn test_kfac_formula3_matches_reference_output() {
    let dir = tempdir().expect("Failed to create temp dir");
    let connect_path = dir.path().join("rapid_connect.csv");
    let kfac_path = dir.path().join("kfac.csv");
    let reference_path = dir.path().join("kfac_reference.csv");

    write_file(&connect_path, "1,2,0,0\n2,0,1,1\n");
    let drainage = DrainageLine::from_parts(vec![1, 2], vec![1.0, 1.0], vec![0.04, 0.01]);
    let connectivity = Connectivity::from_csv(&connect_path).expect("parse failed");

    write_kfac_file(
        &drainage,
        &connectivity,
        1.0,
        KfacFormula::EtaLengthSlopeClipped,
        &kfac_path,
    )
    .expect("kfac failed");

    // Two-element population: p5/p95 clipping only nudges the extremes.
    // length/sqrt(slope) = [5000, 10000] -> clipped [5250, 9750],
    // eta = 1000 / 7500, values = eta * clipped
    let eta = 1000.0 / 7500.0;
    write_file(
        &reference_path,
        &format!("{}\n{}\n", eta * 5250.0, eta * 9750.0),
    );

    assert!(
        compare_csv_decimal_files(&kfac_path, &reference_path, false).expect("compare failed")
    );
}

#[test]
fn test_generate_namelist_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let namelist_path = dir.path().join("rapid_namelist-GENERATE");

    let mut manager = RapidManager::new(None, 1);
    manager
        .update_parameters(vec![
            ("ZS_TauR", "86400"),
            ("ZS_dtR", "900"),
            ("ZS_TauM", "1036800"),
            ("ZS_dtM", "86400"),
            ("rapid_connect_file", "rapid_connect.csv"),
            ("Vlat_file", "m3_riv.nc"),
            ("riv_bas_id_file", "riv_bas_id.csv"),
            ("k_file", "k.csv"),
            ("x_file", "x.csv"),
            ("Qout_file", "Qout.nc"),
        ])
        .expect("update failed");

    manager
        .generate_namelist_file(&namelist_path)
        .expect("generate failed");

    let text = fs::read_to_string(&namelist_path).expect("read failed");
    assert!(text.starts_with("&NL_namelist\n"));
    assert!(text.ends_with("/\n"));
    assert!(text.contains("ZS_TauR = 86400\n"));
    assert!(text.contains("ZS_dtR = 900\n"));
    assert!(text.contains("k_file = 'k.csv'\n"));
    assert!(text.contains("Qout_file = 'Qout.nc'\n"));
    assert!(text.contains("BS_opt_Qinit = .false.\n"));

    // Regeneration is byte-stable
    let again_path = dir.path().join("rapid_namelist-AGAIN");
    manager
        .generate_namelist_file(&again_path)
        .expect("generate failed");
    assert_eq!(text, fs::read_to_string(&again_path).expect("read failed"));
}

#[test]
fn test_update_namelist_file_preserves_unrelated_lines() {
    let dir = tempdir().expect("Failed to create temp dir");
    let namelist_path = dir.path().join("rapid_namelist-UPDATE");

    write_file(
        &namelist_path,
        "&NL_namelist\n\
         ! tuned by hand, do not touch\n\
         k_file = 'old_k.csv'\n\
         x_file = 'old_x.csv'\n\
         ZS_TauR = 3600\n\
         fake_file = 'fake.csv'\n\
         /\n",
    );

    let mut manager = RapidManager::new(None, 1);
    manager
        .update_parameters(vec![
            ("k_file", "k.csv"),
            ("x_file", "x.csv"),
            ("ZS_TauR", "86400"),
        ])
        .expect("update failed");
    manager
        .update_namelist_file(&namelist_path)
        .expect("update file failed");

    let text = fs::read_to_string(&namelist_path).expect("read failed");
    assert!(text.contains("! tuned by hand, do not touch\n"));
    assert!(text.contains("k_file = 'k.csv'\n"));
    assert!(text.contains("x_file = 'x.csv'\n"));
    assert!(text.contains("ZS_TauR = 86400\n"));
    assert!(!text.contains("old_k.csv"));
    // Parameters RAPID does not know are dropped, not carried along
    assert!(!text.contains("fake_file"));
    assert!(text.starts_with("&NL_namelist\n"));
    assert!(text.trim_end().ends_with('/'));
}

#[test]
fn test_namelist_with_reach_numbers() {
    let dir = tempdir().expect("Failed to create temp dir");
    let connect_path = dir.path().join("rapid_connect.csv");
    let bas_path = dir.path().join("riv_bas_id.csv");
    let namelist_path = dir.path().join("rapid_namelist-NUMBERS");

    write_file(&connect_path, "10,0,1,20\n20,10,2,30,40\n30,20,0,0,0\n40,20,0,0,0\n");
    write_file(&bas_path, "10\n20\n30\n");

    let mut manager = RapidManager::new(None, 1);
    manager
        .update_parameters(vec![
            ("rapid_connect_file", connect_path.to_str().unwrap()),
            ("riv_bas_id_file", bas_path.to_str().unwrap()),
        ])
        .expect("update failed");
    manager
        .update_reach_number_data()
        .expect("reach numbers failed");

    assert_eq!(
        manager.namelist().get("IS_riv_tot"),
        Some(&ParamValue::Int(4))
    );
    assert_eq!(
        manager.namelist().get("IS_max_up"),
        Some(&ParamValue::Int(2))
    );
    assert_eq!(
        manager.namelist().get("IS_riv_bas"),
        Some(&ParamValue::Int(3))
    );

    manager
        .generate_namelist_file(&namelist_path)
        .expect("generate failed");
    let text = fs::read_to_string(&namelist_path).expect("read failed");
    assert!(text.contains("IS_riv_tot = 4\n"));
    assert!(text.contains("IS_max_up = 2\n"));
    assert!(text.contains("IS_riv_bas = 3\n"));
}
