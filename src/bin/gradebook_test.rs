use rubricsheet::downloader::to_csv;
use rubricsheet::gradebook::normalize_score;
use rubricsheet::loader::parse_grid;
use rubricsheet::{Error, ExtractOptions, extract};

const EXPORT: &str = "\
Student,ID,SIS User ID,Section,Crit A Final Score,Crit A Unposted Final Score,Crit B: Reasoning Final Score,Current Score,Unposted Current Score
    Points Possible,,,,(read only),(read only),(read only),(read only),(read only)
Jane Doe,42,jd42,S1,80,70,100,85,80
\"Lee, Ann\",7,al7,S1,55,55,,40,40
,,,,,,,,
Trailing Row,9,tr9,S1,10,10,10,10,10
";

fn main() {
    println!("=== Gradebook Test Suite ===\n");
    let options = ExtractOptions::default();

    println!("Test 1: Parsing the export");
    let grid = parse_grid(EXPORT).unwrap_or_else(|e| panic!("parse failed: {e}"));
    assert_eq!(grid.height(), 6);
    assert_eq!(grid.width(), 9);
    println!("{} rows x {} columns - PASS\n", grid.height(), grid.width());

    println!("Test 2: Standards come from Final Score columns only");
    let extraction = extract(&grid, &options).unwrap_or_else(|e| panic!("extract failed: {e}"));
    assert_eq!(extraction.standards, vec!["Crit A", "Crit B: Reasoning"]);
    println!("Standards: {:?} - PASS\n", extraction.standards);

    println!("Test 3: Students stop at the first blank name");
    let names: Vec<&str> = extraction.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Jane Doe (42)", "Lee, Ann (7)"]);
    println!("Students: {:?} - PASS\n", names);

    println!("Test 4: Scores rescaled onto the rubric");
    let jane = &extraction.records[0];
    assert_eq!(jane.score("Crit A"), Some("3.2"));
    assert_eq!(jane.score("Crit B: Reasoning"), Some("4.0"));
    let ann = &extraction.records[1];
    assert_eq!(ann.score("Crit A"), Some("2.2"));
    assert_eq!(ann.score("Crit B: Reasoning"), Some("0.0"));
    println!("Jane Doe: {:?} - PASS\n", jane.scores);

    println!("Test 5: Normalization edge values");
    assert_eq!(normalize_score(Some(0.0), 4.0, 1), "0.0");
    assert_eq!(normalize_score(Some(100.0), 4.0, 1), "4.0");
    assert_eq!(normalize_score(None, 4.0, 1), "0.0");
    assert_eq!(normalize_score(Some(-0.1), 4.0, 1), "0.0");
    assert_eq!(normalize_score(Some(50.0), 5.0, 2), "2.50");
    println!("0 -> 0.0, 100 -> 4.0, blank -> 0.0 - PASS\n");

    println!("Test 6: Missing points-possible row");
    let broken = parse_grid("Student,ID,Crit A Final Score\nJane Doe,42,80\n")
        .unwrap_or_else(|e| panic!("parse failed: {e}"));
    match extract(&broken, &options) {
        Err(Error::MalformedInput(msg)) => println!("Rejected: {msg} - PASS\n"),
        other => panic!("expected MalformedInput, got {other:?}"),
    }

    println!("Test 7: Dump");
    let csv = to_csv(&extraction).unwrap_or_else(|e| panic!("dump failed: {e}"));
    assert!(csv.starts_with("Student,Crit A,Crit B: Reasoning\n"));
    assert!(csv.contains("\"Lee, Ann (7)\",2.2,0.0"));
    println!("{csv}PASS\n");

    println!("All tests completed.");
}
