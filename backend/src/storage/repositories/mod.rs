pub mod attendance_repository;
pub mod student_repository;
pub mod subject_repository;

pub use attendance_repository::AttendanceRepository;
pub use student_repository::StudentRepository;
pub use subject_repository::SubjectRepository;
